//! Asynchronous CSV reader with batch interface
//!
//! Reads command rows from any `futures::io::AsyncRead` source in batches.
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of Commands
//!                  ↓
//!           csv_format module
//!           (CommandRecord, convert_command_record)
//! ```

use crate::io::csv_format::{convert_command_record, CommandRecord};
use crate::types::Command;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous command journal reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    ///
    /// # Arguments
    ///
    /// * `reader` - Async reader providing CSV data
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 0,
        }
    }

    /// Read a batch of commands
    ///
    /// Reads up to `batch_size` valid commands. Rows that fail to parse are
    /// logged with their line number and skipped.
    ///
    /// # Returns
    ///
    /// The commands read, in file order. An empty vector means the end of
    /// the input was reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Command> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CommandRecord>();

        while batch.len() < batch_size {
            let Some(row) = records.next().await else {
                break;
            };
            self.line_num += 1;
            let line = self.line_num + 1;

            match row.map_err(|e| format!("CSV parse error: {}", e)) {
                Ok(record) => match convert_command_record(record) {
                    Ok(command) => batch.push(command),
                    Err(error) => warn!(line, %error, "skipping row"),
                },
                Err(error) => warn!(line, %error, "skipping row"),
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use rust_decimal_macros::dec;

    const HEADER: &str =
        "op,ref,user,symbol,quantity,target,ratio,effective_date,idempotency_key,description\n";

    fn reader(rows: &str) -> AsyncReader<Cursor<Vec<u8>>> {
        AsyncReader::new(Cursor::new(format!("{}{}", HEADER, rows).into_bytes()))
    }

    fn quantities(batch: &[Command]) -> Vec<rust_decimal::Decimal> {
        batch
            .iter()
            .filter_map(|command| match command {
                Command::Issue { request, .. } => Some(request.quantity),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_async_reader_multiple_batches() {
        let mut reader = reader(
            "issue,,1,ABC,1,,,,,\n\
             issue,,1,ABC,2,,,,,\n\
             issue,,1,ABC,3,,,,,\n\
             issue,,1,ABC,4,,,,,\n\
             issue,,1,ABC,5,,,,,\n",
        );

        assert_eq!(quantities(&reader.read_batch(2).await), vec![dec!(1), dec!(2)]);
        assert_eq!(quantities(&reader.read_batch(2).await), vec![dec!(3), dec!(4)]);
        assert_eq!(quantities(&reader.read_batch(2).await), vec![dec!(5)]);
        assert!(reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_empty_csv() {
        let mut reader = reader("");
        assert!(reader.read_batch(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_skips_invalid_rows() {
        let mut reader = reader(
            "transfer,,1,ABC,1,,,,,\n\
             issue,,1,ABC,2,,,,,\n\
             split,,,ABC,,,,2024-01-01,,\n\
             process,s1,,,,,,,,\n",
        );

        let batch = reader.read_batch(10).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].op(), "issue");
        assert_eq!(batch[1].op(), "process");
    }

    #[tokio::test]
    async fn test_async_reader_whitespace_and_case() {
        let mut reader = reader("  Issue  ,  r1 , 7 , ABC , 1.5 \n");

        let batch = reader.read_batch(10).await;
        match &batch[0] {
            Command::Issue { label, request } => {
                assert_eq!(label.as_deref(), Some("r1"));
                assert_eq!(request.user_id, 7);
                assert_eq!(request.quantity, dec!(1.5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
