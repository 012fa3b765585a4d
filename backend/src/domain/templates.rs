//! Built-in catalog templates seeded for every newly created child.
//!
//! Presentation data only: editors are free to replace all of it, and none
//! of the ledger logic depends on the contents.

use shared::{PointTask, Reward, ScheduleEntry};

fn slot(time: &str, activity: &str, note: &str) -> ScheduleEntry {
    ScheduleEntry {
        time: time.to_string(),
        activity: activity.to_string(),
        note: Some(note.to_string()),
    }
}

pub fn default_schedule() -> Vec<ScheduleEntry> {
    vec![
        slot("06:30-07:00", "Wake up, wash up, breakfast", "You got up on time again, great job!"),
        slot("07:00-07:30", "Pack schoolbag, get ready for school", "Getting ready all by yourself, so independent!"),
        slot("07:30-16:00", "School", "You did great at school today!"),
        slot("16:00-16:30", "Home, rest, snack", "Long day, take a little break!"),
        slot("16:30-17:30", "Homework and review", "Working hard, improving fast!"),
        slot("17:30-18:00", "Exercise or outdoor play", "Exercise keeps you healthy and full of energy!"),
        slot("18:00-19:00", "Dinner with the family", "Eating together is the best part of the day!"),
        slot("19:00-19:30", "Reading or practice", "You love reading more and more!"),
        slot("19:30-20:00", "Bath, get ready for bed", "You take such good care of yourself!"),
        slot("20:00-20:30", "Family chat and sharing", "What made you proud today?"),
        slot("20:30", "Lights out", "Good night, tomorrow is another great day!"),
    ]
}

pub fn default_point_tasks() -> Vec<PointTask> {
    [
        ("Get up on time", 1),
        ("Finish homework", 2),
        ("Help with chores", 1),
        ("Read for 30 minutes", 1),
        ("Exercise for 30 minutes", 1),
        ("Share something you learned", 1),
    ]
    .into_iter()
    .map(|(name, points)| PointTask {
        name: name.to_string(),
        points,
    })
    .collect()
}

pub fn default_rewards() -> Vec<Reward> {
    [
        ("Sticker", 10),
        ("Small stationery", 15),
        ("Ice cream", 20),
        ("30 minutes of game time", 25),
        ("Small gift", 30),
        ("Family day out", 50),
    ]
    .into_iter()
    .map(|(name, cost)| Reward {
        name: name.to_string(),
        cost,
    })
    .collect()
}
