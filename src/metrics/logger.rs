use std::fs::File;
use std::path::Path;

use csv::Writer;

use super::EpisodeRecord;
use crate::error::Result;

pub struct EpisodeLogger {
    writer: Writer<File>,
}

impl EpisodeLogger {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let writer = Writer::from_path(path)?;
        Ok(Self { writer })
    }

    pub fn log(&mut self, record: &EpisodeRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn log_batch(&mut self, records: &[EpisodeRecord]) -> Result<()> {
        for record in records {
            self.writer.serialize(record)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_logging_writes_a_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episodes.csv");
        let records = vec![
            EpisodeRecord {
                policy: "linear".into(),
                case_id: 0,
                status: "reach goal".into(),
                nav_time: 8.25,
                steps: 33,
                cumulative_reward: 1.0,
                min_separation: 0.42,
            },
            EpisodeRecord {
                policy: "linear".into(),
                case_id: 1,
                status: "collision".into(),
                nav_time: 3.0,
                steps: 12,
                cumulative_reward: -0.25,
                min_separation: 0.0,
            },
        ];
        let mut logger = EpisodeLogger::new(&path).unwrap();
        logger.log_batch(&records).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let back: Vec<EpisodeRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(back, records);
    }
}
