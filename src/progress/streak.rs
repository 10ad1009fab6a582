use time::Date;

/// Daily streak after a login on `today`, given the day of the previous login.
///
/// Same day keeps the streak, the following day extends it, anything else
/// (first login, a missed day, a previous login dated in the future) starts
/// over at 1.
pub fn next_streak(current: u32, last_login: Option<Date>, today: Date) -> u32 {
    let Some(last_login) = last_login else {
        return 1;
    };
    match (today - last_login).whole_days() {
        0 => current,
        1 => current.saturating_add(1),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn same_day_is_unchanged() {
        assert_eq!(next_streak(4, Some(date!(2024 - 03 - 10)), date!(2024 - 03 - 10)), 4);
    }

    #[test]
    fn next_day_increments() {
        assert_eq!(next_streak(4, Some(date!(2024 - 03 - 10)), date!(2024 - 03 - 11)), 5);
        // across a month boundary
        assert_eq!(next_streak(1, Some(date!(2024 - 02 - 29)), date!(2024 - 03 - 01)), 2);
    }

    #[test]
    fn gaps_reset_to_one() {
        assert_eq!(next_streak(4, Some(date!(2024 - 03 - 10)), date!(2024 - 03 - 12)), 1);
        assert_eq!(next_streak(4, Some(date!(2023 - 03 - 10)), date!(2024 - 03 - 10)), 1);
        assert_eq!(next_streak(4, None, date!(2024 - 03 - 10)), 1);
        assert_eq!(next_streak(4, Some(date!(2024 - 03 - 11)), date!(2024 - 03 - 10)), 1);
    }
}
