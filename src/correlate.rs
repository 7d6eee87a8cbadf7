use crate::record::Record;

/// Consecutive records sharing one job id. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    records: Vec<Record>,
}

impl Run {
    pub fn job_id(&self) -> &str {
        self.records[0].job_id()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Cut `records` into runs wherever the job id changes from the previous record.
///
/// On input sorted by job id this gives exactly one run per job id.
pub fn correlate(records: Vec<Record>) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for record in records {
        match runs.last_mut() {
            Some(run) if run.job_id() == record.job_id() => run.records.push(record),
            _ => runs.push(Run { records: vec![record] }),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{sample, sort_by_job_id};

    #[test]
    fn test_empty_input_gives_no_runs() {
        assert!(correlate(Vec::new()).is_empty());
    }

    #[test]
    fn test_sorted_input_one_run_per_job() {
        let mut records = vec![
            sample("EntryA", "b", "1"),
            sample("EntryA", "a", "2"),
            sample("ExitA", "b", "3"),
            sample("ExitA", "a", "4"),
            sample("EntryC", "c", "5"),
        ];
        sort_by_job_id(&mut records);
        let runs = correlate(records.clone());

        let shape: Vec<(&str, Vec<&str>)> = runs
            .iter()
            .map(|r| (r.job_id(), r.records().iter().map(Record::message).collect()))
            .collect();
        assert_eq!(
            shape,
            vec![("a", vec!["2", "4"]), ("b", vec!["1", "3"]), ("c", vec!["5"])]
        );

        let flattened: Vec<Record> = runs.iter().flat_map(|r| r.records().to_vec()).collect();
        assert_eq!(flattened, records);
    }

    #[test]
    fn test_unsorted_input_splits_on_every_change() {
        let records = vec![sample("X", "a", "1"), sample("X", "b", "2"), sample("X", "a", "3")];
        let runs = correlate(records);
        assert_eq!(runs.len(), 3);
        assert!(runs.iter().all(|r| r.len() == 1));
    }
}
