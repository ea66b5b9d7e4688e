//! Slot Model.
//!
//! Pure rendering of a court's occupancy as 30-minute slots. Nothing in here
//! touches storage or the clock: callers pass in the confirmed bookings and
//! blocked periods covering the requested range, the operating hours, the
//! viewer and "now", and get back the same slots every time for the same
//! input.
//!
//! Day boundaries are operator-local (`chrono_tz::Tz`); every timestamp
//! handed in or out is UTC. Wall-clock times that do not exist on a given
//! day (spring-forward gap) produce no slot.

use crate::types::{
    BlockedPeriod, Booking, BookingId, BookingStatus, InstanceSettings, MatchParticipant, UserId,
    player_count,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

/// Scheduling granularity in minutes.
pub const SLOT_MINUTES: i64 = 30;

/// Durations offered on an available slot.
pub const OFFERED_DURATIONS: [u32; 2] = [60, 90];

/// Shortest booking worth leaving room for when gap optimisation is on.
pub const MIN_BOOKABLE_MINUTES: i64 = 60;

/// Capacity assumed for an open match stored without one.
pub const DEFAULT_MATCH_CAPACITY: u32 = 4;

/// Status of one slot as seen by one viewer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SlotStatus {
    /// Free. `available_durations` lists what can start here (may be empty).
    Available {
        /// Bookable durations in minutes
        available_durations: Vec<u32>,
    },
    /// Someone else's private booking
    Booked {
        /// Occupying booking
        booking_id: BookingId,
    },
    /// Admin block
    Blocked {
        /// Reason shown to users
        reason: Option<String>,
    },
    /// Joinable open match
    OpenMatchAvailable {
        /// Match booking
        booking_id: BookingId,
        /// Players so far
        current_participants: u32,
        /// Capacity
        max_participants: u32,
    },
    /// Open match at capacity
    OpenMatchFull {
        /// Match booking
        booking_id: BookingId,
        /// Players so far
        current_participants: u32,
        /// Capacity
        max_participants: u32,
    },
    /// Viewer's own private booking
    MyPrivateBooking {
        /// Viewer's booking
        booking_id: BookingId,
    },
    /// Open match the viewer organizes or plays in
    MyJoinedMatch {
        /// Match booking
        booking_id: BookingId,
        /// Players so far
        current_participants: u32,
        /// Capacity
        max_participants: u32,
    },
    /// Already started. Non-interactive.
    Past,
}

impl SlotStatus {
    /// Whether a client may offer booking, joining or waitlisting here.
    #[must_use]
    pub const fn is_interactive(&self) -> bool {
        !matches!(self, Self::Past)
    }
}

/// One 30-minute slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Inclusive start (UTC)
    pub start_time: DateTime<Utc>,
    /// Exclusive end (UTC)
    pub end_time: DateTime<Utc>,
    /// Classification
    #[serde(flatten)]
    pub status: SlotStatus,
}

/// A confirmed booking together with its participant rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledBooking {
    /// The booking
    pub booking: Booking,
    /// Participant rows (empty for private bookings)
    pub participants: Vec<MatchParticipant>,
}

impl ScheduledBooking {
    fn involves(&self, viewer: UserId) -> bool {
        self.booking.user_id == viewer || self.participants.iter().any(|p| p.user_id == viewer)
    }
}

/// Everything the Slot Model needs to render a court.
#[derive(Clone, Copy, Debug)]
pub struct ScheduleContext<'a> {
    /// Operator time zone for day boundaries and operating hours
    pub tz: Tz,
    /// Operating hours and gap optimisation flag
    pub settings: &'a InstanceSettings,
    /// Bookings overlapping the requested range
    pub bookings: &'a [ScheduledBooking],
    /// Blocks overlapping the requested range
    pub blocks: &'a [BlockedPeriod],
    /// Requesting user, for viewer-relative statuses
    pub viewer: Option<UserId>,
    /// Reference time for `past`
    pub now: DateTime<Utc>,
}

/// A Monday-to-Sunday schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSchedule {
    /// Monday
    pub week_start: NaiveDate,
    /// Sunday
    pub week_end: NaiveDate,
    /// Slots per local date, keyed `YYYY-MM-DD`
    pub schedule: BTreeMap<NaiveDate, Vec<Slot>>,
}

/// Monday and Sunday of the week containing `date`.
#[must_use]
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}

/// UTC range covering the local dates `first..=last`, midnight to midnight.
///
/// Used to scope storage queries before handing results to the Slot Model.
#[must_use]
pub fn utc_range(tz: Tz, first: NaiveDate, last: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_to_utc(tz, first, NaiveTime::MIN).unwrap_or_else(|| naive_utc(first));
    let next = last + Duration::days(1);
    let end = local_to_utc(tz, next, NaiveTime::MIN).unwrap_or_else(|| naive_utc(next));
    (start, end)
}

/// Resolve a local wall-clock time to UTC. `None` inside a DST gap.
#[must_use]
pub fn local_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn naive_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Local opening and closing instants of `date`, if the day has operating hours.
#[must_use]
pub fn operating_window(
    tz: Tz,
    date: NaiveDate,
    settings: &InstanceSettings,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if settings.close_time <= settings.open_time {
        return None;
    }
    let open = local_to_utc(tz, date, settings.open_time)?;
    let close = local_to_utc(tz, date, settings.close_time)?;
    Some((open, close))
}

/// Slot start instants for one local day, `[open, close)` in 30-minute steps.
fn slot_starts(tz: Tz, date: NaiveDate, settings: &InstanceSettings) -> Vec<DateTime<Utc>> {
    let step = Duration::minutes(SLOT_MINUTES);
    let mut starts = Vec::new();
    if settings.close_time <= settings.open_time {
        return starts;
    }

    let mut local = date.and_time(settings.open_time);
    let close = date.and_time(settings.close_time);
    while local + step <= close {
        if let Some(start) = tz.from_local_datetime(&local).earliest() {
            starts.push(start.with_timezone(&Utc));
        }
        local += step;
    }
    starts
}

/// Raw occupancy of a slot before viewer and time overrides.
enum Occupant<'a> {
    Free,
    Block(&'a BlockedPeriod),
    Booking(&'a ScheduledBooking),
}

impl Occupant<'_> {
    const fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }
}

fn occupant<'a>(
    ctx: &ScheduleContext<'a>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Occupant<'a> {
    if let Some(block) = ctx.blocks.iter().find(|b| b.overlaps(start, end)) {
        return Occupant::Block(block);
    }
    ctx.bookings
        .iter()
        .find(|b| b.booking.status == BookingStatus::Confirmed && b.booking.overlaps(start, end))
        .map_or(Occupant::Free, Occupant::Booking)
}

/// Render one local day.
#[must_use]
pub fn day_slots(ctx: &ScheduleContext<'_>, date: NaiveDate) -> Vec<Slot> {
    let step = Duration::minutes(SLOT_MINUTES);
    let starts = slot_starts(ctx.tz, date, ctx.settings);
    let occupants: Vec<Occupant<'_>> = starts
        .iter()
        .map(|&start| occupant(ctx, start, start + step))
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(index, &start)| {
            let status = if start <= ctx.now {
                SlotStatus::Past
            } else {
                classify(ctx, &starts, &occupants, index)
            };
            Slot {
                start_time: start,
                end_time: start + step,
                status,
            }
        })
        .collect()
}

/// Render the Monday-to-Sunday week containing `date`.
#[must_use]
pub fn week_schedule(ctx: &ScheduleContext<'_>, date: NaiveDate) -> WeekSchedule {
    let (week_start, week_end) = week_bounds(date);
    let schedule = week_start
        .iter_days()
        .take(7)
        .map(|day| (day, day_slots(ctx, day)))
        .collect();

    WeekSchedule {
        week_start,
        week_end,
        schedule,
    }
}

fn classify(
    ctx: &ScheduleContext<'_>,
    starts: &[DateTime<Utc>],
    occupants: &[Occupant<'_>],
    index: usize,
) -> SlotStatus {
    match &occupants[index] {
        Occupant::Free => SlotStatus::Available {
            available_durations: available_durations(ctx.settings, starts, occupants, index),
        },
        Occupant::Block(block) => SlotStatus::Blocked {
            reason: block.reason.clone(),
        },
        Occupant::Booking(scheduled) => booking_status(scheduled, ctx.viewer),
    }
}

fn booking_status(scheduled: &ScheduledBooking, viewer: Option<UserId>) -> SlotStatus {
    let booking = &scheduled.booking;
    let mine = viewer.is_some_and(|v| scheduled.involves(v));

    if !booking.is_open_match {
        return if mine {
            SlotStatus::MyPrivateBooking {
                booking_id: booking.id,
            }
        } else {
            SlotStatus::Booked {
                booking_id: booking.id,
            }
        };
    }

    let current_participants = player_count(booking.user_id, &scheduled.participants);
    let max_participants = booking.max_participants.unwrap_or(DEFAULT_MATCH_CAPACITY);
    if mine {
        SlotStatus::MyJoinedMatch {
            booking_id: booking.id,
            current_participants,
            max_participants,
        }
    } else if current_participants < max_participants {
        SlotStatus::OpenMatchAvailable {
            booking_id: booking.id,
            current_participants,
            max_participants,
        }
    } else {
        SlotStatus::OpenMatchFull {
            booking_id: booking.id,
            current_participants,
            max_participants,
        }
    }
}

/// Length of the contiguous free run starting at `from`, in slots.
fn free_run(starts: &[DateTime<Utc>], occupants: &[Occupant<'_>], from: usize) -> usize {
    let step = Duration::minutes(SLOT_MINUTES);
    let mut run = 0;
    while let Some(occupant) = occupants.get(from + run) {
        if !occupant.is_free() {
            break;
        }
        // Slots must be back-to-back in UTC.
        if run > 0 && starts[from + run] != starts[from + run - 1] + step {
            break;
        }
        run += 1;
    }
    run
}

fn available_durations(
    settings: &InstanceSettings,
    starts: &[DateTime<Utc>],
    occupants: &[Occupant<'_>],
    index: usize,
) -> Vec<u32> {
    let run = free_run(starts, occupants, index);
    let min_fragment = usize::try_from(MIN_BOOKABLE_MINUTES / SLOT_MINUTES).unwrap_or(2);

    OFFERED_DURATIONS
        .iter()
        .copied()
        .filter(|&minutes| {
            let needed = slots_for(minutes);
            if needed > run {
                return false;
            }
            if !settings.gap_optimization {
                return true;
            }
            let leftover = run - needed;
            leftover == 0 || leftover >= min_fragment
        })
        .collect()
}

/// Number of slots a booking of `minutes` occupies.
#[must_use]
pub fn slots_for(minutes: u32) -> usize {
    let slot = u32::try_from(SLOT_MINUTES).unwrap_or(30);
    usize::try_from(minutes.div_ceil(slot)).unwrap_or(usize::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{BlockedPeriodId, CourtId};
    use chrono_tz::Europe::Madrid;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 6, 10).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
        local_to_utc(Madrid, date, NaiveTime::from_hms_opt(h, m, 0).unwrap()).unwrap()
    }

    fn booking(court: CourtId, owner: UserId, start: DateTime<Utc>, minutes: i64) -> Booking {
        Booking {
            id: BookingId::new(),
            court_id: court,
            user_id: owner,
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            status: BookingStatus::Confirmed,
            is_open_match: false,
            max_participants: None,
            auto_cancel_hours_before: None,
            created_at: start - Duration::days(2),
        }
    }

    fn slot_at(slots: &[Slot], start: DateTime<Utc>) -> &SlotStatus {
        &slots.iter().find(|s| s.start_time == start).unwrap().status
    }

    fn durations(status: &SlotStatus) -> Vec<u32> {
        match status {
            SlotStatus::Available {
                available_durations,
            } => available_durations.clone(),
            other => panic!("expected available, got {other:?}"),
        }
    }

    #[test]
    fn day_covers_operating_hours_in_half_hours() {
        let settings = InstanceSettings::default();
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &[],
            blocks: &[],
            viewer: None,
            now: at(monday(), 0, 0) - Duration::days(1),
        };

        let slots = day_slots(&ctx, monday());
        assert_eq!(slots.len(), 28);
        assert_eq!(slots[0].start_time, at(monday(), 8, 0));
        assert_eq!(slots[27].end_time, at(monday(), 22, 0));
        assert_eq!(durations(&slots[27].status), Vec::<u32>::new());
        assert_eq!(durations(&slots[26].status), vec![60]);
        assert_eq!(durations(&slots[0].status), vec![60, 90]);
    }

    #[test]
    fn booked_hour_shapes_neighbouring_durations() {
        let court = CourtId::new();
        let settings = InstanceSettings::default();
        let bookings = [ScheduledBooking {
            booking: booking(court, UserId::new(), at(monday(), 10, 0), 60),
            participants: vec![],
        }];
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &bookings,
            blocks: &[],
            viewer: None,
            now: at(monday(), 7, 0),
        };

        let slots = day_slots(&ctx, monday());
        assert!(matches!(slot_at(&slots, at(monday(), 10, 0)), SlotStatus::Booked { .. }));
        assert!(matches!(slot_at(&slots, at(monday(), 10, 30)), SlotStatus::Booked { .. }));
        assert_eq!(durations(slot_at(&slots, at(monday(), 9, 30))), Vec::<u32>::new());
        assert_eq!(durations(slot_at(&slots, at(monday(), 9, 0))), vec![60]);
        assert_eq!(durations(slot_at(&slots, at(monday(), 8, 30))), vec![60, 90]);
        assert_eq!(durations(slot_at(&slots, at(monday(), 11, 0))), vec![60, 90]);
    }

    #[test]
    fn gap_optimisation_hides_durations_leaving_half_hour_fragments() {
        let court = CourtId::new();
        let settings = InstanceSettings {
            gap_optimization: true,
            ..InstanceSettings::default()
        };
        let bookings = [ScheduledBooking {
            booking: booking(court, UserId::new(), at(monday(), 10, 0), 60),
            participants: vec![],
        }];
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &bookings,
            blocks: &[],
            viewer: None,
            now: at(monday(), 7, 0),
        };

        let slots = day_slots(&ctx, monday());
        assert_eq!(durations(slot_at(&slots, at(monday(), 8, 0))), vec![60]);
        assert_eq!(durations(slot_at(&slots, at(monday(), 8, 30))), vec![90]);
        assert_eq!(durations(slot_at(&slots, at(monday(), 9, 0))), vec![60]);
    }

    #[test]
    fn blocks_win_over_bookings_and_carry_reason() {
        let court = CourtId::new();
        let settings = InstanceSettings::default();
        let bookings = [ScheduledBooking {
            booking: booking(court, UserId::new(), at(monday(), 12, 0), 60),
            participants: vec![],
        }];
        let blocks = [BlockedPeriod {
            id: BlockedPeriodId::new(),
            court_id: court,
            start_time: at(monday(), 12, 30),
            end_time: at(monday(), 14, 0),
            reason: Some("Resurfacing".to_string()),
            is_full_day: false,
        }];
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &bookings,
            blocks: &blocks,
            viewer: None,
            now: at(monday(), 7, 0),
        };

        let slots = day_slots(&ctx, monday());
        assert!(matches!(slot_at(&slots, at(monday(), 12, 0)), SlotStatus::Booked { .. }));
        assert_eq!(
            slot_at(&slots, at(monday(), 12, 30)),
            &SlotStatus::Blocked {
                reason: Some("Resurfacing".to_string())
            }
        );
        assert!(matches!(slot_at(&slots, at(monday(), 13, 30)), SlotStatus::Blocked { .. }));
    }

    #[test]
    fn open_match_status_depends_on_count_and_viewer() {
        let court = CourtId::new();
        let organizer = UserId::new();
        let player = UserId::new();
        let settings = InstanceSettings::default();
        let mut open = booking(court, organizer, at(monday(), 14, 0), 60);
        open.is_open_match = true;
        open.max_participants = Some(2);
        open.auto_cancel_hours_before = Some(6);
        let joined_at = open.created_at;

        let forming = [ScheduledBooking {
            booking: open.clone(),
            participants: vec![MatchParticipant {
                booking_id: open.id,
                user_id: organizer,
                joined_at,
            }],
        }];
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &forming,
            blocks: &[],
            viewer: Some(player),
            now: at(monday(), 7, 0),
        };
        assert_eq!(
            slot_at(&day_slots(&ctx, monday()), at(monday(), 14, 0)),
            &SlotStatus::OpenMatchAvailable {
                booking_id: open.id,
                current_participants: 1,
                max_participants: 2,
            }
        );

        let mut full = forming.clone();
        full[0].participants.push(MatchParticipant {
            booking_id: open.id,
            user_id: player,
            joined_at,
        });
        let outsider = ScheduleContext {
            bookings: &full,
            viewer: Some(UserId::new()),
            ..ctx
        };
        assert!(matches!(
            slot_at(&day_slots(&outsider, monday()), at(monday(), 14, 30)),
            SlotStatus::OpenMatchFull { current_participants: 2, .. }
        ));

        let participant = ScheduleContext {
            bookings: &full,
            ..ctx
        };
        assert!(matches!(
            slot_at(&day_slots(&participant, monday()), at(monday(), 14, 0)),
            SlotStatus::MyJoinedMatch { .. }
        ));
    }

    #[test]
    fn own_private_booking_is_viewer_relative() {
        let court = CourtId::new();
        let owner = UserId::new();
        let settings = InstanceSettings::default();
        let bookings = [ScheduledBooking {
            booking: booking(court, owner, at(monday(), 18, 0), 90),
            participants: vec![],
        }];
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &bookings,
            blocks: &[],
            viewer: Some(owner),
            now: at(monday(), 7, 0),
        };

        let slots = day_slots(&ctx, monday());
        assert!(matches!(
            slot_at(&slots, at(monday(), 19, 0)),
            SlotStatus::MyPrivateBooking { .. }
        ));
    }

    #[test]
    fn started_slots_are_past_regardless_of_occupancy() {
        let court = CourtId::new();
        let settings = InstanceSettings::default();
        let bookings = [ScheduledBooking {
            booking: booking(court, UserId::new(), at(monday(), 9, 0), 60),
            participants: vec![],
        }];
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &bookings,
            blocks: &[],
            viewer: None,
            now: at(monday(), 9, 15),
        };

        let slots = day_slots(&ctx, monday());
        assert_eq!(slot_at(&slots, at(monday(), 8, 0)), &SlotStatus::Past);
        assert_eq!(slot_at(&slots, at(monday(), 9, 0)), &SlotStatus::Past);
        assert!(matches!(slot_at(&slots, at(monday(), 9, 30)), SlotStatus::Booked { .. }));
        assert!(!SlotStatus::Past.is_interactive());
    }

    #[test]
    fn week_runs_monday_to_sunday_in_local_days() {
        let settings = InstanceSettings::default();
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &[],
            blocks: &[],
            viewer: None,
            now: at(monday(), 0, 0),
        };

        let wednesday = NaiveDate::from_ymd_opt(2030, 6, 12).unwrap();
        let week = week_schedule(&ctx, wednesday);
        assert_eq!(week.week_start, monday());
        assert_eq!(week.week_end, NaiveDate::from_ymd_opt(2030, 6, 16).unwrap());
        assert_eq!(week.schedule.len(), 7);
        assert!(week.schedule.values().all(|day| day.len() == 28));

        let json = serde_json::to_value(&week).unwrap();
        assert!(json["schedule"]["2030-06-10"].is_array());
        assert_eq!(json["weekStart"], "2030-06-10");
    }

    #[test]
    fn spring_forward_gap_produces_no_slots() {
        let sunday = NaiveDate::from_ymd_opt(2030, 3, 31).unwrap();
        let settings = InstanceSettings {
            open_time: NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(5, 0, 0).unwrap(),
            ..InstanceSettings::default()
        };
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &[],
            blocks: &[],
            viewer: None,
            now: at(sunday, 0, 0) - Duration::days(1),
        };

        let slots = day_slots(&ctx, sunday);
        // 02:00 and 02:30 do not exist locally.
        assert_eq!(slots.len(), 6);
        // 01:30 is followed by 03:00 without any elapsed gap.
        assert_eq!(durations(&slots[1].status), vec![60, 90]);
    }

    #[test]
    fn repeated_autumn_hour_breaks_free_runs() {
        let sunday = NaiveDate::from_ymd_opt(2030, 10, 27).unwrap();
        let settings = InstanceSettings {
            open_time: NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
            ..InstanceSettings::default()
        };
        let ctx = ScheduleContext {
            tz: Madrid,
            settings: &settings,
            bookings: &[],
            blocks: &[],
            viewer: None,
            now: at(sunday, 0, 0) - Duration::days(1),
        };

        let slots = day_slots(&ctx, sunday);
        assert_eq!(slots.len(), 6);
        // 02:30 (first occurrence) and 03:00 are an hour apart in real time.
        assert_eq!(durations(&slots[2].status), vec![60]);
        assert_eq!(durations(&slots[3].status), Vec::<u32>::new());
    }

    #[test]
    fn slot_serializes_with_flat_status_tag() {
        let slot = Slot {
            start_time: at(monday(), 8, 0),
            end_time: at(monday(), 8, 30),
            status: SlotStatus::Available {
                available_durations: vec![60],
            },
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["status"], "available");
        assert_eq!(json["availableDurations"], serde_json::json!([60]));
        assert!(json["startTime"].is_string());
    }
}
