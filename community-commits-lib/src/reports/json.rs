use crate::Result;
use crate::aggregate::DatedPushEvents;
use core::fmt::Write;
use serde_json::json;

pub fn generate<W: Write>(groups: &[DatedPushEvents], writer: &mut W) -> Result<()> {
    let dates: Vec<_> = groups
        .iter()
        .map(|group| {
            let events: Vec<_> = group
                .events
                .iter()
                .map(|event| {
                    json!({
                        "repo": event.repo_slug,
                        "created_at": event.created_at.to_rfc3339(),
                        "commits": event.commits.iter().map(|c| json!({
                            "url": c.commit_url,
                            "message": c.message,
                        })).collect::<Vec<_>>(),
                    })
                })
                .collect();

            json!({
                "date": group.date,
                "events": events,
            })
        })
        .collect();

    let output = json!({
        "dates": dates
    });

    write!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}
