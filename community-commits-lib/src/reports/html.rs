use crate::Result;
use crate::aggregate::DatedPushEvents;
use crate::source::PushEvent;
use chrono::{DateTime, Utc};
use core::fmt::Write;

pub fn generate<W: Write>(groups: &[DatedPushEvents], timestamp: DateTime<Utc>, writer: &mut W) -> Result<()> {
    writeln!(writer, "<!DOCTYPE html>")?;
    writeln!(writer, "<html lang=\"en\">")?;
    writeln!(writer, "<head>")?;
    writeln!(writer, "  <meta charset=\"UTF-8\">")?;
    writeln!(writer, "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
    writeln!(writer, "  <title>Community Commits</title>")?;
    write_styles(writer)?;
    writeln!(writer, "</head>")?;
    writeln!(writer, "<body>")?;
    write_header(writer, groups, timestamp)?;

    if groups.is_empty() {
        writeln!(writer, "  <p class=\"empty\">No community activity found.</p>")?;
    }

    for group in groups {
        writeln!(writer, "  <section class=\"day\">")?;
        writeln!(writer, "    <h2>{}</h2>", html_escape(&group.date))?;
        for event in &group.events {
            write_event(writer, event)?;
        }
        writeln!(writer, "  </section>")?;
    }

    writeln!(writer, "</body>")?;
    writeln!(writer, "</html>")?;
    Ok(())
}

fn write_styles<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "  <style>")?;
    writeln!(writer, "    :root {{")?;
    writeln!(writer, "      --bg-color: #f0f2f5;")?;
    writeln!(writer, "      --card-bg: #ffffff;")?;
    writeln!(writer, "      --text-color: #1a202c;")?;
    writeln!(writer, "      --text-secondary: #64748b;")?;
    writeln!(writer, "      --border-color: #e2e8f0;")?;
    writeln!(writer, "      --accent-color: #3b82f6;")?;
    writeln!(writer, "      --shadow: 0 1px 3px rgba(0,0,0,0.08), 0 4px 16px rgba(0,0,0,0.04);")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    @media (prefers-color-scheme: dark) {{")?;
    writeln!(writer, "      :root {{")?;
    writeln!(writer, "        --bg-color: #0f172a;")?;
    writeln!(writer, "        --card-bg: #1e293b;")?;
    writeln!(writer, "        --text-color: #e2e8f0;")?;
    writeln!(writer, "        --text-secondary: #94a3b8;")?;
    writeln!(writer, "        --border-color: #334155;")?;
    writeln!(writer, "        --accent-color: #60a5fa;")?;
    writeln!(writer, "        --shadow: 0 1px 3px rgba(0,0,0,0.3), 0 4px 16px rgba(0,0,0,0.2);")?;
    writeln!(writer, "      }}")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    body {{")?;
    writeln!(writer, "      margin: 0 auto;")?;
    writeln!(writer, "      max-width: 960px;")?;
    writeln!(writer, "      padding: 24px;")?;
    writeln!(writer, "      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;")?;
    writeln!(writer, "      background: var(--bg-color);")?;
    writeln!(writer, "      color: var(--text-color);")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    .subtitle, .pushed, .empty {{ color: var(--text-secondary); }}")?;
    writeln!(writer, "    .day h2 {{ border-bottom: 1px solid var(--border-color); padding-bottom: 4px; }}")?;
    writeln!(writer, "    .card {{")?;
    writeln!(writer, "      background: var(--card-bg);")?;
    writeln!(writer, "      border: 1px solid var(--border-color);")?;
    writeln!(writer, "      border-radius: 8px;")?;
    writeln!(writer, "      box-shadow: var(--shadow);")?;
    writeln!(writer, "      margin: 12px 0;")?;
    writeln!(writer, "      padding: 12px 16px;")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    .card h3 {{ margin: 0 0 4px 0; font-size: 1.05em; }}")?;
    writeln!(writer, "    .card ul {{ margin: 8px 0 0 0; padding-left: 20px; }}")?;
    writeln!(writer, "    a {{ color: var(--accent-color); text-decoration: none; }}")?;
    writeln!(writer, "    a:hover {{ text-decoration: underline; }}")?;
    writeln!(writer, "  </style>")?;
    Ok(())
}

fn write_header<W: Write>(writer: &mut W, groups: &[DatedPushEvents], timestamp: DateTime<Utc>) -> Result<()> {
    let repositories: usize = groups.iter().map(|g| g.events.len()).sum();
    let commits: usize = groups.iter().flat_map(|g| &g.events).map(|e| e.commits.len()).sum();

    writeln!(writer, "  <header>")?;
    writeln!(writer, "    <h1>Community Commits</h1>")?;
    writeln!(
        writer,
        "    <p class=\"subtitle\">{commits} commits across {repositories} repositories. Produced by community-commits {} on {}</p>",
        env!("CARGO_PKG_VERSION"),
        timestamp.format("%Y-%m-%d %H:%M UTC")
    )?;
    writeln!(writer, "  </header>")?;
    Ok(())
}

fn write_event<W: Write>(writer: &mut W, event: &PushEvent) -> Result<()> {
    let slug = html_escape(&event.repo_slug);

    writeln!(writer, "    <div class=\"card\">")?;
    writeln!(writer, "      <h3><a href=\"https://github.com/{slug}\">{slug}</a></h3>")?;
    writeln!(
        writer,
        "      <span class=\"pushed\">first pushed {}</span>",
        event.created_at.format("%H:%M UTC")
    )?;
    writeln!(writer, "      <ul>")?;
    for commit in &event.commits {
        let summary = commit.message.lines().next().unwrap_or_default();
        writeln!(
            writer,
            "        <li><a href=\"{}\">{}</a></li>",
            html_escape(&commit.commit_url),
            html_escape(summary)
        )?;
    }
    writeln!(writer, "      </ul>")?;
    writeln!(writer, "    </div>")?;
    Ok(())
}

fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}
