use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Generator for client-assigned message ids.
///
/// Local ids never collide with server ids (servers assign numbers or
/// UUIDs, never the `local-` prefix) and stay unique within a run even
/// when two are minted in the same millisecond.
#[derive(Debug, Default)]
pub(crate) struct LocalIds {
    counter: u64,
}

impl LocalIds {
    pub(crate) fn next(&mut self) -> String {
        self.counter += 1;
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        format!("local-{millis}-{}", self.counter)
    }
}

/// Current UTC time as an RFC 3339 string, matching the timestamp shape
/// the backend uses for message records.
pub(crate) fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
