use time::{OffsetDateTime, UtcOffset};

/// Expiry handed to resolvers that sign upload URLs.
///
/// Every URL signed during one UTC day expires at the same instant (the next
/// 24:00:00.000 boundary), which keeps signed URLs stable across requests and
/// lets shared caches reuse rendered pages for the rest of the day.
pub fn signed_url_expiry(now: OffsetDateTime) -> OffsetDateTime {
    let now = now.to_offset(UtcOffset::UTC);
    match now.date().next_day() {
        Some(next) => next.midnight().assume_utc(),
        None => now,
    }
}

pub(crate) fn signed_url_expiry_now() -> OffsetDateTime {
    signed_url_expiry(OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn rounds_up_to_next_midnight() {
        assert_eq!(
            signed_url_expiry(datetime!(2024-03-05 13:14:15 UTC)),
            datetime!(2024-03-06 00:00:00 UTC)
        );
    }

    #[test]
    fn exact_midnight_moves_to_following_day() {
        assert_eq!(
            signed_url_expiry(datetime!(2024-03-05 00:00:00 UTC)),
            datetime!(2024-03-06 00:00:00 UTC)
        );
    }

    #[test]
    fn crosses_month_and_year_boundaries() {
        assert_eq!(
            signed_url_expiry(datetime!(2023-12-31 23:59:59.999 UTC)),
            datetime!(2024-01-01 00:00:00 UTC)
        );
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        assert_eq!(
            signed_url_expiry(datetime!(2024-03-05 23:30:00 -02:00)),
            datetime!(2024-03-07 00:00:00 UTC)
        );
    }
}
