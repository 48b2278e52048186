use crate::domain::context::RawRecipient;
use std::io::Read;

/// Reads payout recipients from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding raw (unvalidated) recipients lazily so large files stream without
/// loading everything up front. Validation happens later in the pipeline.
pub struct RecipientReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RecipientReader<R> {
    /// Creates a new `RecipientReader` from any `Read` source (e.g., File,
    /// Stdin). Expected header: `source_record_id,user_id,payout_email,
    /// amount,currency,note` with amount in cents.
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn recipients(self) -> impl Iterator<Item = Result<RawRecipient, csv::Error>> {
        self.reader.into_deserialize()
    }
}
