use tokio::sync::oneshot;

use crate::errors::{BootstrapError, Result};

const FIELD_SEPARATOR: char = '+';
const NAME_SEPARATOR: char = ':';

/// Recognised URI fields and the player flag each one becomes.
const FIELD_FLAGS: &[(&str, &str)] = &[
    ("LaunchExp", "-launchExp"),
    ("gameinfo", "-ticket"),
    ("placelauncherurl", "-scriptURL"),
    ("robloxLocale", "-rloc"),
    ("gameLocale", "-gloc"),
    ("launchtime", "-launchtime"),
    ("browsertrackerid", "-browserTrackerId"),
];

const PERCENT_DECODED: &[&str] = &["placelauncherurl"];

/// Name/value pairs in first-seen order; a repeated name keeps its slot and takes the
/// latest value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFields(Vec<(String, String)>);

impl ParsedFields {
    pub fn parse(raw: &str) -> Result<Self> {
        let body = strip_scheme(raw.trim());
        let mut fields: Vec<(String, String)> = Vec::new();

        for field in body.split(FIELD_SEPARATOR) {
            if field.is_empty() {
                continue;
            }
            let Some((name, value)) = field.split_once(NAME_SEPARATOR) else {
                return Err(BootstrapError::MalformedField(field.to_string()));
            };
            match fields.iter_mut().find(|(existing, _)| existing == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => fields.push((name.to_string(), value.to_string())),
            }
        }

        Ok(Self(fields))
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// `scheme://` is a prefix; the bare `scheme:N` head of real URIs is an ordinary field.
fn strip_scheme(raw: &str) -> &str {
    match raw.find("://") {
        Some(index)
            if !raw[..index].contains(FIELD_SEPARATOR) && !raw[..index].contains(NAME_SEPARATOR) =>
        {
            &raw[index + 3..]
        }
        _ => raw,
    }
}

/// Ordered `(flag, value)` pairs handed to the player process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchArguments(Vec<(&'static str, String)>);

impl LaunchArguments {
    pub fn from_fields(fields: &ParsedFields) -> Result<Self> {
        let mut pairs = Vec::new();
        for (name, value) in fields.iter() {
            let Some(flag) = flag_for(name) else {
                tracing::debug!("ignoring unknown URI field {}", name);
                continue;
            };
            let value = if PERCENT_DECODED.contains(&name) {
                urlencoding::decode(value)
                    .map_err(|_| BootstrapError::MalformedField(format!("{name}:{value}")))?
                    .into_owned()
            } else {
                value.to_string()
            };
            pairs.push((flag, value));
        }
        Ok(Self(pairs))
    }

    pub fn translate(raw: &str) -> Result<Self> {
        Self::from_fields(&ParsedFields::parse(raw)?)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_argv(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(flag, value)| [flag.to_string(), value.clone()])
            .collect()
    }
}

fn flag_for(name: &str) -> Option<&'static str> {
    FIELD_FLAGS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, flag)| *flag)
}

/// Single-slot hand-off between whoever receives the inbound URI and the launch flow.
pub struct LaunchRequestSlot;

pub type LaunchRequestSender = oneshot::Sender<Result<LaunchArguments>>;
pub type LaunchRequestReceiver = oneshot::Receiver<Result<LaunchArguments>>;

impl LaunchRequestSlot {
    pub fn channel() -> (LaunchRequestSender, LaunchRequestReceiver) {
        oneshot::channel()
    }

    /// Parses `raw` (if any) and fills the slot. No URI leaves the slot empty.
    pub fn submit(sender: LaunchRequestSender, raw: Option<&str>) {
        let Some(raw) = raw else {
            return;
        };
        tracing::info!("handling launch URI");
        let _ = sender.send(LaunchArguments::translate(raw));
    }

    /// An empty slot (sender dropped) means a plain launch with no arguments.
    pub async fn wait(receiver: LaunchRequestReceiver) -> Result<LaunchArguments> {
        match receiver.await {
            Ok(result) => result,
            Err(_) => Ok(LaunchArguments::default()),
        }
    }
}
