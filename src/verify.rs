//! Sort order verification.

use std::cmp::Ordering;
use std::io;
use std::path::Path;

use crate::block::BlockFile;
use crate::record::Record;

/// Checks that `records` are in non-decreasing key order.
/// Stops at the first record whose key is smaller than the one before it.
pub fn is_sorted<I>(records: I) -> io::Result<bool>
where
    I: IntoIterator<Item = io::Result<Record>>,
{
    let mut prev: Option<Record> = None;
    for record in records.into_iter() {
        let record = record?;
        if let Some(prev) = prev {
            if record.cmp_by_key(&prev) == Ordering::Less {
                return Ok(false);
            }
        }
        prev = Some(record);
    }

    return Ok(true);
}

/// Checks that the record file at `path` is in non-decreasing key order.
pub fn is_file_sorted(path: &Path, records_per_block: usize) -> io::Result<bool> {
    let mut file = BlockFile::open(path, records_per_block)?;
    is_sorted(file.records())
}

#[cfg(test)]
mod test {
    use std::io;

    use rstest::*;

    use super::{is_file_sorted, is_sorted};
    use crate::block::write_records;
    use crate::Record;

    fn records(keys: &[f64]) -> Vec<Record> {
        Vec::from_iter(keys.iter().enumerate().map(|(id, key)| Record::new(id as i64, *key)))
    }

    #[rstest]
    #[case(vec![], true)]
    #[case(vec![1.0], true)]
    #[case(vec![1.0, 1.0, 2.0], true)]
    #[case(vec![-3.0, -2.0, -1.0], true)]
    #[case(vec![1.0, 3.0, 2.0], false)]
    #[case(vec![0.0, -0.0], false)]
    fn test_is_sorted(#[case] keys: Vec<f64>, #[case] expected: bool) {
        let input = records(&keys).into_iter().map(Ok);
        assert_eq!(is_sorted(input).unwrap(), expected);
    }

    #[test]
    fn test_input_error() {
        let input = vec![
            Ok(Record::new(0, 1.0)),
            Err(io::Error::new(io::ErrorKind::Other, "test error")),
        ];
        assert!(is_sorted(input).is_err());
    }

    #[rstest]
    #[case(vec![1.0, 2.0, 3.0, 4.0, 5.0], true)]
    #[case(vec![1.0, 2.0, 3.0, 5.0, 4.0], false)]
    fn test_file_verification_idempotent(#[case] keys: Vec<f64>, #[case] expected: bool) {
        let tmp_dir = tempfile::tempdir().unwrap();
        let path = tmp_dir.path().join("data.bin");
        write_records(&path, 2, records(&keys)).unwrap();

        assert_eq!(is_file_sorted(&path, 2).unwrap(), expected);
        assert_eq!(is_file_sorted(&path, 2).unwrap(), expected);
    }
}
