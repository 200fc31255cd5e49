use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use time::{Date, Duration, Month};

use crate::model::{IdGenerator, TimeBlock, TimeBlockDraft, ValidationError};

pub const HOURS_PER_DAY: usize = 24;
const DAYS_PER_WEEK: i64 = 7;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ViewMode {
    Day,
    #[default]
    Week,
    Month,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Day => "Day",
            ViewMode::Week => "Week",
            ViewMode::Month => "Month",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl Direction {
    fn sign(self) -> i64 {
        match self {
            Direction::Previous => -1,
            Direction::Next => 1,
        }
    }
}

/// The Monday on or before `date`.
pub fn week_start(date: Date) -> Date {
    let offset = date.weekday().number_days_from_monday() as i64;
    date.checked_sub(Duration::days(offset)).unwrap_or(date)
}

pub fn month_bounds(date: Date) -> (Date, Date) {
    let first = date.replace_day(1).unwrap_or(date);
    let last_day = date.month().length(date.year());
    let last = date.replace_day(last_day).unwrap_or(date);
    (first, last)
}

/// Ordered, contiguous run of days rendered for `mode` around `cursor`.
pub fn display_days(cursor: Date, mode: ViewMode) -> Vec<Date> {
    match mode {
        ViewMode::Day => vec![cursor],
        ViewMode::Week => consecutive_days(week_start(cursor), DAYS_PER_WEEK as usize),
        ViewMode::Month => {
            let (first, last) = month_bounds(cursor);
            let len = (last - first).whole_days() as usize + 1;
            consecutive_days(first, len)
        }
    }
}

fn consecutive_days(start: Date, len: usize) -> Vec<Date> {
    let mut days = Vec::with_capacity(len);
    let mut current = Some(start);
    while days.len() < len {
        let Some(day) = current else {
            break;
        };
        days.push(day);
        current = day.next_day();
    }
    days
}

/// Moves the cursor by one unit of `mode`. Month steps keep the day of month
/// when it exists in the target month and otherwise roll the surplus days into
/// the month after it (Jan 31 + 1 month = Mar 2 or 3).
pub fn shift_cursor(cursor: Date, mode: ViewMode, direction: Direction) -> Date {
    let sign = direction.sign();
    match mode {
        ViewMode::Day => cursor.checked_add(Duration::days(sign)).unwrap_or(cursor),
        ViewMode::Week => cursor
            .checked_add(Duration::days(sign * DAYS_PER_WEEK))
            .unwrap_or(cursor),
        ViewMode::Month => add_months(cursor, sign).unwrap_or(cursor),
    }
}

fn add_months(date: Date, delta: i64) -> Option<Date> {
    let index = date.year() as i64 * 12 + (date.month() as i64 - 1) + delta;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = Month::try_from((index.rem_euclid(12) + 1) as u8).ok()?;
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    first.checked_add(Duration::days(date.day() as i64 - 1))
}

/// `"00:00"` through `"23:00"`.
pub fn time_slots() -> Vec<String> {
    (0..HOURS_PER_DAY).map(|hour| format!("{hour:02}:00")).collect()
}

fn slot_hour(slot: &str) -> &str {
    slot.split(':').next().unwrap_or(slot)
}

pub fn occupies_slot(block: &TimeBlock, day: Date, slot: &str) -> bool {
    block.date == day && block.start_time.starts_with(slot_hour(slot))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRow<'a> {
    pub label: String,
    /// One entry per displayed day; every block starting in this hour, in
    /// collection order.
    pub cells: Vec<Vec<&'a TimeBlock>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarGrid<'a> {
    pub days: Vec<Date>,
    pub rows: Vec<SlotRow<'a>>,
}

impl<'a> CalendarGrid<'a> {
    pub fn cell(&self, day_index: usize, hour: usize) -> &[&'a TimeBlock] {
        self.rows
            .get(hour)
            .and_then(|row| row.cells.get(day_index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn occupied_cells(&self) -> impl Iterator<Item = (Date, &str, &[&'a TimeBlock])> + '_ {
        self.rows.iter().flat_map(move |row| {
            row.cells
                .iter()
                .enumerate()
                .filter(|(_, blocks)| !blocks.is_empty())
                .map(move |(idx, blocks)| (self.days[idx], row.label.as_str(), blocks.as_slice()))
        })
    }
}

pub fn build_grid<'a>(days: &[Date], blocks: &'a [TimeBlock]) -> CalendarGrid<'a> {
    let rows = time_slots()
        .into_iter()
        .map(|label| {
            let cells = days
                .iter()
                .map(|day| {
                    blocks
                        .iter()
                        .filter(|block| occupies_slot(block, *day, &label))
                        .collect()
                })
                .collect();
            SlotRow { label, cells }
        })
        .collect();
    CalendarGrid {
        days: days.to_vec(),
        rows,
    }
}

pub fn header_text(cursor: Date, mode: ViewMode) -> String {
    match mode {
        ViewMode::Day => format!("{} {}, {}", cursor.month(), cursor.day(), cursor.year()),
        ViewMode::Week => {
            let start = week_start(cursor);
            let end = start.checked_add(Duration::days(6)).unwrap_or(start);
            format!(
                "{} {} - {} {}, {}",
                start.month(),
                start.day(),
                end.month(),
                end.day(),
                end.year()
            )
        }
        ViewMode::Month => format!("{} {}", cursor.month(), cursor.year()),
    }
}

pub fn short_weekday(date: Date) -> String {
    date.weekday().to_string().chars().take(3).collect()
}

#[derive(Debug, Clone)]
pub struct CalendarViewModel<'a> {
    pub header: String,
    pub mode: ViewMode,
    pub today: Date,
    pub grid: CalendarGrid<'a>,
}

impl CalendarViewModel<'_> {
    pub fn is_today(&self, day: Date) -> bool {
        day == self.today
    }
}

/// Calendar screen state: the time-block collection plus the cursor and mode
/// that select which part of it is on screen.
#[derive(Debug, Clone)]
pub struct CalendarBoard {
    blocks: Vec<TimeBlock>,
    cursor: Date,
    mode: ViewMode,
    ids: IdGenerator,
}

impl CalendarBoard {
    pub fn new(blocks: Vec<TimeBlock>, cursor: Date, mode: ViewMode) -> Self {
        let ids = IdGenerator::seeded(blocks.iter().map(|block| block.id.as_str()));
        Self {
            blocks,
            cursor,
            mode,
            ids,
        }
    }

    pub fn blocks(&self) -> &[TimeBlock] {
        &self.blocks
    }

    pub fn cursor(&self) -> Date {
        self.cursor
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn set_cursor(&mut self, cursor: Date) {
        self.cursor = cursor;
    }

    pub fn navigate(&mut self, direction: Direction) {
        self.cursor = shift_cursor(self.cursor, self.mode, direction);
    }

    pub fn add_block(
        &mut self,
        draft: &TimeBlockDraft,
        now_ms: i64,
    ) -> Result<&TimeBlock, ValidationError> {
        let valid = draft.validate()?;
        let id = self.ids.next_id(now_ms);
        self.blocks.push(valid.into_block(id));
        let added = self.blocks.len() - 1;
        Ok(&self.blocks[added])
    }

    pub fn delete_block(&mut self, id: &str) -> Option<TimeBlock> {
        let index = self.blocks.iter().position(|block| block.id == id)?;
        Some(self.blocks.remove(index))
    }

    pub fn display_days(&self) -> Vec<Date> {
        display_days(self.cursor, self.mode)
    }

    /// Blocks on `day`, ordered by start time.
    pub fn blocks_on(&self, day: Date) -> Vec<&TimeBlock> {
        let mut blocks: Vec<_> = self.blocks.iter().filter(|b| b.date == day).collect();
        blocks.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        blocks
    }

    pub fn view_model(&self, today: Date) -> CalendarViewModel<'_> {
        let days = self.display_days();
        CalendarViewModel {
            header: header_text(self.cursor, self.mode),
            mode: self.mode,
            today,
            grid: build_grid(&days, &self.blocks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use time::Weekday;

    fn block(id: &str, date: Date, start: &str, task: &str) -> TimeBlock {
        TimeBlock {
            id: id.to_string(),
            date,
            start_time: start.to_string(),
            end_time: "23:59".to_string(),
            task: task.to_string(),
        }
    }

    #[test]
    fn day_view_is_just_the_cursor() {
        let cursor = date!(2024 - 03 - 06);
        assert_eq!(display_days(cursor, ViewMode::Day), vec![cursor]);
    }

    #[test]
    fn week_view_starts_on_monday_for_every_weekday() {
        let mut cursor = date!(2023 - 12 - 25);
        for _ in 0..60 {
            let days = display_days(cursor, ViewMode::Week);
            assert_eq!(days.len(), 7);
            assert_eq!(days[0].weekday(), Weekday::Monday);
            assert!(days[0] <= cursor && cursor <= days[6]);
            assert!(days.windows(2).all(|w| w[0].next_day() == Some(w[1])));
            cursor = cursor.next_day().unwrap();
        }
    }

    #[test]
    fn week_view_crosses_year_boundary() {
        let days = display_days(date!(2025 - 01 - 01), ViewMode::Week);
        assert_eq!(days[0], date!(2024 - 12 - 30));
        assert_eq!(days[6], date!(2025 - 01 - 05));
    }

    #[test]
    fn month_view_covers_whole_month_contiguously() {
        for (cursor, expected_len) in [
            (date!(2024 - 02 - 15), 29),
            (date!(2023 - 02 - 01), 28),
            (date!(2024 - 04 - 30), 30),
            (date!(2024 - 12 - 31), 31),
        ] {
            let days = display_days(cursor, ViewMode::Month);
            assert_eq!(days.len(), expected_len);
            assert_eq!(days[0].day(), 1);
            assert!(days.iter().all(|d| d.month() == cursor.month() && d.year() == cursor.year()));
            assert!(days.windows(2).all(|w| w[0].next_day() == Some(w[1])));
        }
    }

    #[test]
    fn navigation_steps_by_mode() {
        let cursor = date!(2024 - 03 - 04);
        assert_eq!(
            shift_cursor(cursor, ViewMode::Day, Direction::Next),
            date!(2024 - 03 - 05)
        );
        assert_eq!(
            shift_cursor(cursor, ViewMode::Week, Direction::Previous),
            date!(2024 - 02 - 26)
        );
        assert_eq!(
            shift_cursor(cursor, ViewMode::Month, Direction::Next),
            date!(2024 - 04 - 04)
        );
        assert_eq!(
            shift_cursor(date!(2024 - 01 - 15), ViewMode::Month, Direction::Previous),
            date!(2023 - 12 - 15)
        );
    }

    #[test]
    fn month_navigation_rolls_overflowing_days_forward() {
        assert_eq!(
            shift_cursor(date!(2023 - 01 - 31), ViewMode::Month, Direction::Next),
            date!(2023 - 03 - 03)
        );
        assert_eq!(
            shift_cursor(date!(2024 - 01 - 31), ViewMode::Month, Direction::Next),
            date!(2024 - 03 - 02)
        );
        assert_eq!(
            shift_cursor(date!(2024 - 03 - 31), ViewMode::Month, Direction::Previous),
            date!(2024 - 03 - 02)
        );
    }

    #[test]
    fn slots_cover_every_hour() {
        let slots = time_slots();
        assert_eq!(slots.len(), 24);
        assert_eq!(slots.first().map(String::as_str), Some("00:00"));
        assert_eq!(slots.last().map(String::as_str), Some("23:00"));
    }

    #[test]
    fn standup_lands_in_single_cell_of_week_grid() {
        let mut board = CalendarBoard::new(Vec::new(), date!(2024 - 03 - 06), ViewMode::Week);
        let mut draft = TimeBlockDraft::new(date!(2024 - 03 - 04));
        draft.task = "Standup".into();
        board.add_block(&draft, 1).expect("valid block");

        let model = board.view_model(date!(2024 - 03 - 06));
        let occupied: Vec<_> = model.grid.occupied_cells().collect();
        assert_eq!(occupied.len(), 1);
        let (day, slot, blocks) = occupied[0];
        assert_eq!(day, date!(2024 - 03 - 04));
        assert_eq!(slot, "09:00");
        assert_eq!(blocks[0].task, "Standup");
        assert_eq!(model.grid.cell(0, 9).len(), 1);
        assert_eq!(model.header, "March 4 - March 10, 2024");
    }

    #[test]
    fn cells_keep_every_block_sharing_a_start_hour() {
        let day = date!(2024 - 03 - 04);
        let blocks = vec![
            block("1", day, "09:00", "Standup"),
            block("2", day, "09:30", "Review"),
            block("3", day, "10:00", "Focus"),
        ];
        let grid = build_grid(&[day], &blocks);
        let tasks: Vec<_> = grid.cell(0, 9).iter().map(|b| b.task.as_str()).collect();
        assert_eq!(tasks, vec!["Standup", "Review"]);
        assert_eq!(grid.cell(0, 10).len(), 1);
    }

    #[test]
    fn blocks_on_other_days_stay_out_of_the_grid() {
        let blocks = vec![block("1", date!(2024 - 03 - 11), "09:00", "Next week")];
        let days = display_days(date!(2024 - 03 - 04), ViewMode::Week);
        let grid = build_grid(&days, &blocks);
        assert_eq!(grid.occupied_cells().count(), 0);
    }

    #[test]
    fn delete_removes_only_matching_block() {
        let day = date!(2024 - 03 - 04);
        let mut board = CalendarBoard::new(
            vec![block("1", day, "09:00", "a"), block("2", day, "10:00", "b")],
            day,
            ViewMode::Day,
        );
        assert!(board.delete_block("missing").is_none());
        let removed = board.delete_block("1").expect("removed");
        assert_eq!(removed.task, "a");
        assert_eq!(board.blocks().len(), 1);
        assert_eq!(board.blocks()[0].id, "2");
    }

    #[test]
    fn new_block_ids_follow_existing_ones() {
        let day = date!(2024 - 03 - 04);
        let mut board = CalendarBoard::new(vec![block("500", day, "09:00", "a")], day, ViewMode::Day);
        let mut draft = TimeBlockDraft::new(day);
        draft.task = "b".into();
        let id = board.add_block(&draft, 100).expect("valid").id.clone();
        assert_eq!(id, "501");
    }

    #[test]
    fn headers_match_view_mode() {
        let cursor = date!(2024 - 03 - 04);
        assert_eq!(header_text(cursor, ViewMode::Day), "March 4, 2024");
        assert_eq!(header_text(cursor, ViewMode::Month), "March 2024");
        assert_eq!(
            header_text(date!(2024 - 12 - 31), ViewMode::Week),
            "December 30 - January 5, 2025"
        );
    }

    #[test]
    fn view_modes_parse_case_insensitively() {
        assert_eq!("WEEK".parse::<ViewMode>().unwrap(), ViewMode::Week);
        assert_eq!(ViewMode::Month.to_string(), "month");
        assert_eq!(ViewMode::default(), ViewMode::Week);
    }
}
