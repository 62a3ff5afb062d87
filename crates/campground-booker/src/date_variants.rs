use chrono::{Days, NaiveDate};

use crate::booking_types::DateVariant;

/// Date pairs to try, closest to the requested stay first.
///
/// Yields the base pair, then shifts of 1..=`flexible_days` alternating
/// earlier and later (-1, +1, -2, +2, ...). Every variant keeps the base
/// stay length. Shifts that fall outside the calendar range are skipped.
pub fn date_variants(base: DateVariant, flexible_days: u32) -> DateVariants {
    DateVariants {
        base,
        flexible_days,
        step: 0,
    }
}

/// Iterator returned by [`date_variants`]; clone it to restart the sequence.
#[derive(Debug, Clone)]
pub struct DateVariants {
    base: DateVariant,
    flexible_days: u32,
    step: u64,
}

impl DateVariants {
    fn shifted(&self, offset: u64, earlier: bool) -> Option<DateVariant> {
        let days = Days::new(offset);
        let (check_in, check_out) = if earlier {
            (
                self.base.check_in.checked_sub_days(days)?,
                self.base.check_out.checked_sub_days(days)?,
            )
        } else {
            (
                self.base.check_in.checked_add_days(days)?,
                self.base.check_out.checked_add_days(days)?,
            )
        };
        Some(DateVariant::new(check_in, check_out))
    }
}

impl Iterator for DateVariants {
    type Item = DateVariant;

    fn next(&mut self) -> Option<DateVariant> {
        let last_step = 2 * u64::from(self.flexible_days);
        while self.step <= last_step {
            let step = self.step;
            self.step += 1;

            if step == 0 {
                return Some(self.base);
            }
            let offset = step.div_ceil(2);
            if let Some(variant) = self.shifted(offset, step % 2 == 1) {
                return Some(variant);
            }
        }
        None
    }
}

/// Convenience for callers holding plain dates
pub fn variants_for(check_in: NaiveDate, check_out: NaiveDate, flexible_days: u32) -> Vec<DateVariant> {
    date_variants(DateVariant::new(check_in, check_out), flexible_days).collect()
}
