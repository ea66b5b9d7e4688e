//! proptest strategies for schedule inputs.

use chrono::{DateTime, Duration, Utc};
use courtside_core::schedule::{SLOT_MINUTES, ScheduledBooking};
use courtside_core::types::{
    Booking, BookingId, BookingStatus, CourtId, MatchParticipant, UserId,
};
use proptest::prelude::*;

/// Number of half-hour slots in an 08:00–22:00 day.
pub const SLOTS_PER_DAY: usize = 28;

/// Raw booking request: `(first slot, length in slots, open match, capacity, extra players)`.
type Shape = (usize, usize, bool, u32, u32);

fn shape() -> impl Strategy<Value = Shape> {
    (0..SLOTS_PER_DAY, 1usize..=6, any::<bool>(), 2u32..=4, 0u32..=3)
}

/// Non-overlapping confirmed bookings inside a day opening at `open`.
///
/// Requests that would overlap an earlier one, or run past closing, are
/// dropped. Open matches get the organizer's row plus up to three extra
/// players, never more than capacity.
pub fn day_bookings(
    court: CourtId,
    open: DateTime<Utc>,
) -> impl Strategy<Value = Vec<ScheduledBooking>> {
    prop::collection::vec(shape(), 0..8).prop_map(move |shapes| {
        let step = Duration::minutes(SLOT_MINUTES);
        let mut taken = [false; SLOTS_PER_DAY];
        let mut out = Vec::new();

        for (first, len, is_open, max, extra) in shapes {
            let last = first + len;
            if last > SLOTS_PER_DAY || taken[first..last].iter().any(|t| *t) {
                continue;
            }
            taken[first..last].iter_mut().for_each(|t| *t = true);

            let owner = UserId::new();
            let start = open + step * i32::try_from(first).unwrap();
            let booking = Booking {
                id: BookingId::new(),
                court_id: court,
                user_id: owner,
                start_time: start,
                end_time: start + step * i32::try_from(len).unwrap(),
                status: BookingStatus::Confirmed,
                is_open_match: is_open,
                max_participants: is_open.then_some(max),
                auto_cancel_hours_before: is_open.then_some(6),
                created_at: open - Duration::days(1),
            };

            let participants = if is_open {
                let players = (1 + extra).min(max);
                (0..players)
                    .map(|i| MatchParticipant {
                        booking_id: booking.id,
                        user_id: if i == 0 { owner } else { UserId::new() },
                        joined_at: booking.created_at + Duration::minutes(i64::from(i)),
                    })
                    .collect()
            } else {
                Vec::new()
            };
            out.push(ScheduledBooking {
                booking,
                participants,
            });
        }
        out
    })
}
