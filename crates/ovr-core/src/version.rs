use std::fmt;
use std::str::FromStr;

const FIELD_COUNT: usize = 4;

/// A four-component build identifier (`major.minor.revision.patch`).
///
/// The all-zero value stands for "no local build recorded".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionId {
    pub major: u16,
    pub minor: u16,
    pub revision: u16,
    pub patch: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComponent {
    Major,
    Minor,
    Revision,
    Patch,
}

impl VersionComponent {
    const ALL: [Self; FIELD_COUNT] = [Self::Major, Self::Minor, Self::Revision, Self::Patch];

    fn key(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Revision => "revision",
            Self::Patch => "patch",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|component| key.eq_ignore_ascii_case(component.key()))
    }
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("version text is empty")]
    Empty,
    #[error("expected major.minor.revision.patch, got: {input}")]
    InvalidFormat { input: String },
    #[error("invalid {component} component: {value}")]
    InvalidComponent {
        component: VersionComponent,
        value: String,
    },
    #[error("missing {component} entry in version text")]
    MissingComponent { component: VersionComponent },
}

impl VersionId {
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    #[must_use]
    pub const fn new(major: u16, minor: u16, revision: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            revision,
            patch,
        }
    }

    /// Parse a version, absorbing any malformed input into [`VersionId::ZERO`].
    ///
    /// Accepts a dotted identifier, optionally inside a path with a trailing
    /// extension (`builds/1.2.3.4.zip`), or a key-value block with
    /// `Major=`, `Minor=`, `Revision=` and `Patch=` lines.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self::try_parse(input).unwrap_or_else(|error| {
            log::debug!("Treating unparseable version {input:?} as zero: {error}");
            Self::ZERO
        })
    }

    /// Parse a version, reporting why the input was rejected.
    ///
    /// # Errors
    /// Returns an error when the input has fewer or more than four fields, a
    /// field is not a 16-bit unsigned integer, or a key-value block lacks one
    /// of the four entries.
    pub fn try_parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim_start_matches('\u{feff}').trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }

        if trimmed.contains('=') {
            parse_key_value(trimmed)
        } else {
            parse_dotted(trimmed)
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// True when any of the four components differ.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self != other
    }

    fn set(&mut self, component: VersionComponent, value: u16) {
        match component {
            VersionComponent::Major => self.major = value,
            VersionComponent::Minor => self.minor = value,
            VersionComponent::Revision => self.revision = value,
            VersionComponent::Patch => self.patch = value,
        }
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.revision, self.patch
        )
    }
}

impl FromStr for VersionId {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s)
    }
}

fn parse_component(component: VersionComponent, value: &str) -> Result<u16, VersionParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| VersionParseError::InvalidComponent {
            component,
            value: value.to_string(),
        })
}

fn parse_dotted(input: &str) -> Result<VersionId, VersionParseError> {
    let file_name = input.rsplit(['/', '\\']).next().unwrap_or(input);

    let mut fields: Vec<&str> = file_name.split('.').collect();
    // Trailing extensions such as `.zip` or `.tar.gz`.
    while fields.len() > FIELD_COUNT
        && fields
            .last()
            .is_some_and(|field| field.starts_with(|c: char| c.is_ascii_alphabetic()))
    {
        fields.pop();
    }

    if fields.len() != FIELD_COUNT {
        return Err(VersionParseError::InvalidFormat {
            input: input.to_string(),
        });
    }

    let mut version = VersionId::ZERO;
    for (component, field) in VersionComponent::ALL.into_iter().zip(fields) {
        version.set(component, parse_component(component, field)?);
    }
    Ok(version)
}

fn parse_key_value(input: &str) -> Result<VersionId, VersionParseError> {
    let mut found: [Option<u16>; FIELD_COUNT] = [None; FIELD_COUNT];

    for line in input.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let Some(component) = VersionComponent::from_key(key.trim()) else {
            continue;
        };
        found[component as usize] = Some(parse_component(component, value)?);
    }

    let mut version = VersionId::ZERO;
    for (component, value) in VersionComponent::ALL.into_iter().zip(found) {
        let value = value.ok_or(VersionParseError::MissingComponent { component })?;
        version.set(component, value);
    }
    Ok(version)
}
