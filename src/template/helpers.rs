//! Formatting helpers available inside templates.
//!
//! Each helper HTML-escapes its input first and writes its result raw, so the
//! engine does not escape it a second time.
//!
//! | Template name   | Function               |
//! |-----------------|------------------------|
//! | `nl2br`         | [`line_break_to_html`] |
//! | `capitalize`    | [`capitalize`]         |
//! | `referrershort` | [`truncate_referrer`]  |
//! | `ticketEvent`   | [`ticket_event`]       |

use std::collections::HashMap;
use std::fmt;

use handlebars::{
    html_escape, Context, Handlebars, Helper, HelperDef, HelperResult, JsonRender, Output,
    RenderContext,
};
use lazy_static::lazy_static;
use regex::Regex;

/// Longest referrer kept before truncation
pub const REFERRER_MAX_CHARS: usize = 60;

const ELLIPSIS: &str = "...";

lazy_static! {
    static ref LINE_BREAK: Regex = Regex::new(r"([^>\r\n]?)(\r\n|\n\r|\r|\n)").unwrap();
}

/// Insert `<br>` before every line break.
pub fn line_break_to_html(text: &str) -> String {
    let escaped = html_escape(text);
    LINE_BREAK
        .replace_all(&escaped, "${1}<br>${2}")
        .into_owned()
}

/// Uppercase the first character and lowercase the rest.
pub fn capitalize(text: &str) -> String {
    let escaped = html_escape(text);
    let mut chars = escaped.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Shorten referrers longer than [`REFERRER_MAX_CHARS`] and mark the cut.
pub fn truncate_referrer(text: &str) -> String {
    let escaped = html_escape(text);
    if escaped.chars().count() > REFERRER_MAX_CHARS {
        let mut short: String = escaped.chars().take(REFERRER_MAX_CHARS).collect();
        short.push_str(ELLIPSIS);
        short
    } else {
        escaped
    }
}

/// Ticket activity kinds understood by [`ticket_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketEvent {
    AgentAssignedToAgent,
    AssignedToAgent,
    ChangedTicketStatus,
    StatusChanged,
    ChangedTicketSubject,
    ChangedRequesterEmail,
    YouWereAssigned,
    AgentSolvedTicket,
    FollowUpSent,
    RatingOfferSent,
    Rated,
}

impl TicketEvent {
    pub fn from_tag(tag: &str) -> Option<Self> {
        let event = match tag {
            "agent_assigned_to_agent" => Self::AgentAssignedToAgent,
            "assigned_to_agent" => Self::AssignedToAgent,
            "changed_ticket_status" => Self::ChangedTicketStatus,
            "status_changed" => Self::StatusChanged,
            "changed_ticket_subject" => Self::ChangedTicketSubject,
            "changed_requester_email" => Self::ChangedRequesterEmail,
            "you_were_assigned" => Self::YouWereAssigned,
            "agent_solved_ticket" => Self::AgentSolvedTicket,
            "follow_up_sent" => Self::FollowUpSent,
            "rating_offer_sent" => Self::RatingOfferSent,
            "rated" => Self::Rated,
            _ => return None,
        };
        Some(event)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentAssignedToAgent => "agent_assigned_to_agent",
            Self::AssignedToAgent => "assigned_to_agent",
            Self::ChangedTicketStatus => "changed_ticket_status",
            Self::StatusChanged => "status_changed",
            Self::ChangedTicketSubject => "changed_ticket_subject",
            Self::ChangedRequesterEmail => "changed_requester_email",
            Self::YouWereAssigned => "you_were_assigned",
            Self::AgentSolvedTicket => "agent_solved_ticket",
            Self::FollowUpSent => "follow_up_sent",
            Self::RatingOfferSent => "rating_offer_sent",
            Self::Rated => "rated",
        }
    }

    /// Placeholder substitutions in application order.
    ///
    /// `option` yields an already escaped option value.
    fn substitutions(&self, option: impl Fn(&str) -> String) -> Vec<(&'static str, String)> {
        let strong = |value: String| format!("<strong>{}</strong>", value);

        match self {
            Self::AgentAssignedToAgent => vec![
                ("%operator%", option("operator")),
                ("%assignee%", strong(option("assignee"))),
            ],
            Self::AssignedToAgent => vec![("%assignee%", strong(option("assignee")))],
            Self::ChangedTicketStatus => vec![
                ("%operator%", option("operator")),
                ("%previous_status%", capitalize(&option("previousStatus"))),
                ("%current_status%", strong(capitalize(&option("currentStatus")))),
            ],
            Self::StatusChanged => vec![
                ("%previous_status%", capitalize(&option("previousStatus"))),
                ("%current_status%", strong(capitalize(&option("currentStatus")))),
            ],
            Self::ChangedTicketSubject => vec![
                ("%operator%", option("operator")),
                ("%subject%", strong(option("subject"))),
            ],
            Self::ChangedRequesterEmail => vec![
                ("%operator%", option("operator")),
                ("%email%", strong(option("email"))),
            ],
            Self::YouWereAssigned | Self::AgentSolvedTicket => {
                vec![("%operator%", option("operator"))]
            }
            Self::FollowUpSent | Self::RatingOfferSent => {
                vec![("%name%", strong(option("name")))]
            }
            Self::Rated => vec![
                ("%name%", strong(option("name"))),
                ("%rate%", strong(option("rate"))),
            ],
        }
    }
}

impl fmt::Display for TicketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fill a ticket activity line for `event_type`.
///
/// Only the first occurrence of each placeholder is replaced. Missing options
/// substitute as empty strings; unknown event types return the escaped
/// template with no substitution.
pub fn ticket_event(event_type: &str, template: &str, options: &HashMap<String, String>) -> String {
    let escaped = html_escape(template);

    let Some(event) = TicketEvent::from_tag(event_type) else {
        return escaped;
    };

    let option = |key: &str| {
        options
            .get(key)
            .map(|value| html_escape(value))
            .unwrap_or_default()
    };

    event
        .substitutions(option)
        .into_iter()
        .fold(escaped, |text, (placeholder, value)| {
            text.replacen(placeholder, &value, 1)
        })
}

fn param_text(h: &Helper, index: usize) -> String {
    h.param(index)
        .map(|param| param.value().render())
        .unwrap_or_default()
}

fn nl2br_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&line_break_to_html(&param_text(h, 0)))?;
    Ok(())
}

fn capitalize_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&capitalize(&param_text(h, 0)))?;
    Ok(())
}

fn referrer_short_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&truncate_referrer(&param_text(h, 0)))?;
    Ok(())
}

fn ticket_event_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let event_type = param_text(h, 0);
    let template = param_text(h, 1);
    let options: HashMap<String, String> = h
        .hash()
        .iter()
        .map(|(key, value)| (key.to_string(), value.value().render()))
        .collect();

    out.write(&ticket_event(&event_type, &template, &options))?;
    Ok(())
}

/// Named helpers installed into each template cache's registry.
pub struct HelperTable {
    helpers: Vec<(String, Box<dyn HelperDef + Send + Sync>)>,
}

impl HelperTable {
    /// No helpers at all
    pub fn empty() -> Self {
        Self {
            helpers: Vec::new(),
        }
    }

    /// `nl2br`, `capitalize`, `referrershort` and `ticketEvent`
    pub fn standard() -> Self {
        Self::empty()
            .with("nl2br", nl2br_helper)
            .with("capitalize", capitalize_helper)
            .with("referrershort", referrer_short_helper)
            .with("ticketEvent", ticket_event_helper)
    }

    /// Add or replace a helper. Later registrations win.
    pub fn with<H>(mut self, name: &str, helper: H) -> Self
    where
        H: HelperDef + Send + Sync + 'static,
    {
        self.helpers.retain(|(existing, _)| existing != name);
        self.helpers.push((name.to_string(), Box::new(helper)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.helpers.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    pub(crate) fn install(self, registry: &mut Handlebars<'static>) {
        for (name, helper) in self.helpers {
            registry.register_helper(&name, helper);
        }
    }
}

impl Default for HelperTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for HelperTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
