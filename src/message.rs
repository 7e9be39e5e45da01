//! Alert text for the SMS and voice channels.
//!
//! Both channels carry the same facts: who needs help, where, and when. The
//! contact numbers from the caller's profile are rendered as text only; the
//! messages themselves always go to the verified number.

use chrono::{DateTime, FixedOffset};

use crate::models::{Coordinates, EmergencyContactSnapshot};

const CALL_TO_ACTION: &str = "Please try to reach them immediately. If you cannot, contact local emergency services (112) and share the location above.";
const VOICE: &str = r#"<Say voice="alice" language="en-US">"#;

#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub sms_body: String,
    pub voice_twiml: String,
}

pub struct MessageContext<'a> {
    pub contacts: &'a EmergencyContactSnapshot,
    pub coordinates: Coordinates,
    pub location_url: &'a str,
    pub accuracy: Option<f64>,
    pub user_message: Option<&'a str>,
    pub sent_at: DateTime<FixedOffset>,
    pub timezone_label: &'a str,
}

pub fn compose(ctx: &MessageContext<'_>) -> AlertMessage {
    AlertMessage {
        sms_body: sms_body(ctx),
        voice_twiml: voice_twiml(ctx),
    }
}

pub fn format_timestamp(at: DateTime<FixedOffset>, label: &str) -> String {
    format!("{} {}", at.format("%d/%m/%Y, %I:%M:%S %p"), label)
}

fn contact_line(contacts: &EmergencyContactSnapshot) -> String {
    let numbers = contacts.numbers();
    if numbers.is_empty() {
        "Emergency contacts on file: none".to_string()
    } else {
        format!("Emergency contacts on file: {}", numbers.join(", "))
    }
}

fn sms_body(ctx: &MessageContext<'_>) -> String {
    let mut body = String::from("🚨 EMERGENCY ALERT 🚨\n\n");
    body.push_str(&format!(
        "{} needs emergency assistance!\n",
        ctx.contacts.display_name
    ));
    if let Some(note) = ctx.user_message {
        body.push_str(&format!("Message: {note}\n"));
    }
    body.push_str(&format!(
        "\nTime: {}\n",
        format_timestamp(ctx.sent_at, ctx.timezone_label)
    ));
    body.push_str(&format!("Location: {}\n", ctx.location_url));
    body.push_str(&format!(
        "Coordinates: {}, {}",
        ctx.coordinates.latitude, ctx.coordinates.longitude
    ));
    if let Some(meters) = ctx.accuracy {
        body.push_str(&format!(" (±{} m)", meters.round()));
    }
    body.push_str("\n\n");
    body.push_str(&contact_line(ctx.contacts));
    body.push_str("\n\n");
    body.push_str(CALL_TO_ACTION);
    body
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// Spoken twice with pauses so the listener can catch the details
fn voice_twiml(ctx: &MessageContext<'_>) -> String {
    let name = xml_escape(&ctx.contacts.display_name);
    let alert = format!(
        "Emergency alert! This is an automated emergency call from Healix. {name} has requested emergency assistance."
    );
    let location = format!(
        "Their location is latitude {}, longitude {}. A map link has been sent to this number by text message.",
        ctx.coordinates.latitude, ctx.coordinates.longitude
    );

    let mut twiml = String::from("<Response>");
    for round in 0..2 {
        if round > 0 {
            twiml.push_str(&format!("{VOICE}Repeating the alert.</Say>"));
        }
        twiml.push_str(&format!("{VOICE}{alert}</Say>"));
        twiml.push_str(r#"<Pause length="1"/>"#);
        twiml.push_str(&format!("{VOICE}{location}</Say>"));
        twiml.push_str(r#"<Pause length="2"/>"#);
    }
    twiml.push_str(&format!(
        "{VOICE}Please respond immediately. This call will now end.</Say>"
    ));
    twiml.push_str("</Response>");
    twiml
}
