//! Prompt templates. Every builder is a pure function of its inputs.

use chrono::NaiveDate;
use std::fmt::Write;

use crate::cycle::{CycleStatus, Forecast};
use crate::models::{ChatMessage, ChatRole, CycleRecord, SymptomEntry, UserProfile};

pub const RECENT_SYMPTOM_LIMIT: usize = 10;
pub const RECENT_CYCLE_LIMIT: usize = 3;
pub const CHAT_HISTORY_LIMIT: usize = 10;

const JSON_OUTPUT_FORMAT: &str = r#"Respond ONLY with valid JSON in exactly this format:
{
  "insights": "2-4 sentences about the user's current cycle and symptoms",
  "cyclePredictions": "1-2 sentences about upcoming period, ovulation and fertile window",
  "recommendations": [
    {"category": "nutrition", "text": "..."},
    {"category": "exercise", "text": "..."},
    {"category": "sleep", "text": "..."},
    {"category": "self-care", "text": "..."}
  ]
}"#;

const SAFETY_NOTE: &str = "You are not a doctor. Do not diagnose. Suggest seeing a healthcare \
professional when symptoms are severe, unusual or persistent.";

/// Everything we know about the user, gathered once per request.
pub struct PromptContext<'a> {
    pub today: NaiveDate,
    pub profile: &'a UserProfile,
    pub status: Option<&'a CycleStatus>,
    /// Newest first.
    pub symptoms: &'a [SymptomEntry],
    /// Newest first.
    pub cycles: &'a [CycleRecord],
}

#[derive(Debug, Clone, Default)]
pub struct SymptomReport {
    pub symptoms: Vec<String>,
    pub pain_level: Option<i32>,
    pub mood_level: Option<i32>,
    pub energy_level: Option<i32>,
    pub notes: Option<String>,
}

pub fn insight_prompt(ctx: &PromptContext<'_>) -> String {
    let mut prompt = String::from(
        "You are a supportive menstrual health assistant. Analyze the user's data and give \
personalized, evidence-based insights.\n\n",
    );
    write_profile(&mut prompt, ctx);
    write_cycle_status(&mut prompt, ctx);
    write_symptom_history(&mut prompt, ctx.symptoms);
    write_cycle_history(&mut prompt, ctx.cycles);
    prompt.push_str(SAFETY_NOTE);
    prompt.push_str("\n\n");
    prompt.push_str(JSON_OUTPUT_FORMAT);
    prompt
}

pub fn symptom_analysis_prompt(ctx: &PromptContext<'_>, report: &SymptomReport) -> String {
    let mut prompt = String::from(
        "You are a supportive menstrual health assistant. The user is reporting symptoms \
right now. Explain how they may relate to the current cycle phase and what may help.\n\n",
    );
    write_profile(&mut prompt, ctx);
    write_cycle_status(&mut prompt, ctx);

    prompt.push_str("REPORTED SYMPTOMS:\n");
    if report.symptoms.is_empty() {
        prompt.push_str("- none listed\n");
    }
    for symptom in &report.symptoms {
        let _ = writeln!(prompt, "- {}", symptom);
    }
    write_level(&mut prompt, "Pain level", report.pain_level);
    write_level(&mut prompt, "Mood level", report.mood_level);
    write_level(&mut prompt, "Energy level", report.energy_level);
    if let Some(notes) = report.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        let _ = writeln!(prompt, "Notes: {}", notes.trim());
    }
    prompt.push('\n');

    write_symptom_history(&mut prompt, ctx.symptoms);
    prompt.push_str(SAFETY_NOTE);
    prompt.push_str("\n\n");
    prompt.push_str(JSON_OUTPUT_FORMAT);
    prompt
}

pub fn daily_tip_prompt(ctx: &PromptContext<'_>) -> String {
    let mut prompt = String::from(
        "You are a supportive menstrual health assistant. Write today's short, encouraging \
tip for the user based on where they are in their cycle. Keep \"insights\" to 2 sentences.\n\n",
    );
    write_profile(&mut prompt, ctx);
    write_cycle_status(&mut prompt, ctx);
    write_symptom_history(&mut prompt, &ctx.symptoms[..ctx.symptoms.len().min(3)]);
    prompt.push_str(JSON_OUTPUT_FORMAT);
    prompt
}

/// `history` is oldest first; only the last few turns are included.
pub fn chat_prompt(ctx: &PromptContext<'_>, history: &[ChatMessage], message: &str) -> String {
    let mut prompt = String::from(
        "You are a friendly menstrual health assistant chatting with the user. Answer in \
plain conversational text (no JSON, no markdown headings), at most 150 words.\n\n",
    );
    write_profile(&mut prompt, ctx);
    write_cycle_status(&mut prompt, ctx);
    write_symptom_history(&mut prompt, &ctx.symptoms[..ctx.symptoms.len().min(5)]);

    let recent = &history[history.len().saturating_sub(CHAT_HISTORY_LIMIT)..];
    if !recent.is_empty() {
        prompt.push_str("CONVERSATION SO FAR:\n");
        for turn in recent {
            let speaker = match turn.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            let _ = writeln!(prompt, "{}: {}", speaker, turn.content);
        }
        prompt.push('\n');
    }

    prompt.push_str(SAFETY_NOTE);
    let _ = write!(prompt, "\n\nUser: {}\nAssistant:", message.trim());
    prompt
}

pub fn consultation_prompt(ctx: &PromptContext<'_>, question: &str) -> String {
    let mut prompt = String::from(
        "You are a virtual women's health consultant. Answer the user's question clearly in \
plain text, list possible causes and next steps, and say when an in-person visit is advisable.\n\n",
    );
    write_profile(&mut prompt, ctx);
    write_cycle_status(&mut prompt, ctx);
    write_symptom_history(&mut prompt, ctx.symptoms);
    write_cycle_history(&mut prompt, ctx.cycles);
    prompt.push_str(SAFETY_NOTE);
    let _ = write!(prompt, "\n\nQUESTION: {}\n", question.trim());
    prompt
}

fn write_profile(prompt: &mut String, ctx: &PromptContext<'_>) {
    let p = ctx.profile;
    prompt.push_str("USER PROFILE:\n");
    let _ = writeln!(prompt, "- Name: {}", p.name);
    write_optional(prompt, "Age", p.age.map(|a| a.to_string()));
    write_optional(prompt, "Height", p.height.map(|h| format!("{} cm", h)));
    write_optional(prompt, "Weight", p.weight.map(|w| format!("{} kg", w)));
    let _ = writeln!(prompt, "- Average cycle length: {} days", p.cycle_length);
    let _ = writeln!(prompt, "- Average period length: {} days", p.period_length);
    prompt.push('\n');
}

fn write_cycle_status(prompt: &mut String, ctx: &PromptContext<'_>) {
    let _ = writeln!(prompt, "TODAY: {}", ctx.today.format("%Y-%m-%d"));
    let forecast = Forecast::describe(
        ctx.status.map(|s| s.last_period_date),
        Some(ctx.profile.cycle_length_days()),
    );

    match ctx.status {
        Some(status) => {
            let _ = writeln!(
                prompt,
                "CURRENT CYCLE: day {} of {} ({} phase)",
                status.cycle_day,
                status.cycle_length,
                status.phase.display_name()
            );
            let _ = writeln!(prompt, "- Last period started: {}", status.last_period_date.format("%Y-%m-%d"));
        }
        None => prompt.push_str("CURRENT CYCLE: unknown (no period logged yet)\n"),
    }
    let _ = writeln!(prompt, "- Next period: {}", forecast.next_period);
    let _ = writeln!(prompt, "- Ovulation: {}", forecast.ovulation);
    let _ = writeln!(prompt, "- Fertile window: {}", forecast.fertile_window);
    prompt.push('\n');
}

fn write_symptom_history(prompt: &mut String, symptoms: &[SymptomEntry]) {
    prompt.push_str("RECENT SYMPTOMS:\n");
    if symptoms.is_empty() {
        prompt.push_str("- none logged\n\n");
        return;
    }
    for entry in symptoms.iter().take(RECENT_SYMPTOM_LIMIT) {
        let _ = write!(prompt, "- {}: {}", entry.date.format("%Y-%m-%d"), list_or_none(&entry.symptoms));
        for (label, level) in [
            ("pain", entry.pain_level),
            ("mood", entry.mood_level),
            ("energy", entry.energy_level),
        ] {
            if let Some(level) = level {
                let _ = write!(prompt, ", {} {}/10", label, level);
            }
        }
        prompt.push('\n');
    }
    prompt.push('\n');
}

fn write_cycle_history(prompt: &mut String, cycles: &[CycleRecord]) {
    prompt.push_str("RECENT CYCLES:\n");
    if cycles.is_empty() {
        prompt.push_str("- none logged\n\n");
        return;
    }
    for cycle in cycles.iter().take(RECENT_CYCLE_LIMIT) {
        let _ = write!(
            prompt,
            "- started {}, {} day cycle, {} day period, {} flow, mood {}",
            cycle.start_date.format("%Y-%m-%d"),
            cycle.cycle_length,
            cycle.period_length,
            enum_label(&cycle.flow),
            enum_label(&cycle.mood),
        );
        if let Some(temperature) = cycle.temperature {
            let _ = write!(prompt, ", temperature {:.1}", temperature);
        }
        if !cycle.symptoms.is_empty() {
            let _ = write!(prompt, ", symptoms: {}", cycle.symptoms.join(", "));
        }
        prompt.push('\n');
    }
    prompt.push('\n');
}

fn write_optional(prompt: &mut String, label: &str, value: Option<String>) {
    if let Some(value) = value {
        let _ = writeln!(prompt, "- {}: {}", label, value);
    }
}

fn write_level(prompt: &mut String, label: &str, level: Option<i32>) {
    if let Some(level) = level {
        let _ = writeln!(prompt, "{}: {}/10", label, level);
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "no symptoms".to_string()
    } else {
        items.join(", ")
    }
}

fn enum_label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
