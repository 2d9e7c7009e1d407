use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

/// Blurple accent drawn along the showcase container's left edge.
pub const SHOWCASE_ACCENT_COLOR: u32 = 0x5865F2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    TextDisplay = 10,
    Separator = 14,
    Container = 17,
}

impl Serialize for ComponentType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeparatorSpacing {
    Small = 1,
    Large = 2,
}

impl Serialize for SeparatorSpacing {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextDisplay {
    pub content: String,
}

impl TextDisplay {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl Serialize for TextDisplay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TextDisplay", 2)?;
        state.serialize_field("type", &ComponentType::TextDisplay)?;
        state.serialize_field("content", &self.content)?;
        state.end()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Separator {
    pub divider: bool,
    pub spacing: SeparatorSpacing,
}

impl Separator {
    pub fn divider(spacing: SeparatorSpacing) -> Self {
        Self {
            divider: true,
            spacing,
        }
    }

    // Discord only honors Small spacing once the divider line is hidden.
    pub fn spacer() -> Self {
        Self {
            divider: false,
            spacing: SeparatorSpacing::Small,
        }
    }
}

impl Serialize for Separator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Separator", 3)?;
        state.serialize_field("type", &ComponentType::Separator)?;
        state.serialize_field("divider", &self.divider)?;
        state.serialize_field("spacing", &self.spacing)?;
        state.end()
    }
}

/// Components a container may hold. Containers do not nest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContainerChild {
    Text(TextDisplay),
    Separator(Separator),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Container {
    pub accent_color: Option<u32>,
    pub components: Vec<ContainerChild>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accent_color(mut self, color: u32) -> Self {
        self.accent_color = Some(color);
        self
    }

    pub fn text_display(mut self, content: impl Into<String>) -> Self {
        self.components
            .push(ContainerChild::Text(TextDisplay::new(content)));
        self
    }

    pub fn separator(mut self, separator: Separator) -> Self {
        self.components.push(ContainerChild::Separator(separator));
        self
    }
}

impl Serialize for Container {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let field_count = 2 + usize::from(self.accent_color.is_some());
        let mut state = serializer.serialize_struct("Container", field_count)?;
        state.serialize_field("type", &ComponentType::Container)?;
        if let Some(accent) = self.accent_color {
            state.serialize_field("accent_color", &accent)?;
        }
        state.serialize_field("components", &self.components)?;
        state.end()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Component {
    Container(Container),
    Text(TextDisplay),
    Separator(Separator),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageFlags(u64);

impl MessageFlags {
    pub const EPHEMERAL: MessageFlags = MessageFlags(1 << 6);
    /// Opts the message into components V2 rendering; required whenever the
    /// payload carries V2 components instead of `content`.
    pub const IS_COMPONENTS_V2: MessageFlags = MessageFlags(1 << 15);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, other: MessageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

impl std::ops::BitOr for MessageFlags {
    type Output = MessageFlags;

    fn bitor(self, rhs: MessageFlags) -> MessageFlags {
        MessageFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for MessageFlags {
    fn bitor_assign(&mut self, rhs: MessageFlags) {
        self.0 |= rhs.0;
    }
}

impl Serialize for MessageFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    #[error("invisible separators only support small spacing")]
    UnsupportedSpacerSpacing,
    #[error("component reply is missing the components V2 message flag")]
    MissingComponentsV2Flag,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyMessage {
    pub flags: MessageFlags,
    pub components: Vec<Component>,
}

impl ReplyMessage {
    pub fn components_v2(container: Container) -> Self {
        Self {
            flags: MessageFlags::IS_COMPONENTS_V2,
            components: vec![Component::Container(container)],
        }
    }

    pub fn validate(&self) -> Result<(), ComponentError> {
        if !self.components.is_empty() && !self.flags.contains(MessageFlags::IS_COMPONENTS_V2) {
            return Err(ComponentError::MissingComponentsV2Flag);
        }
        for component in &self.components {
            match component {
                Component::Container(container) => {
                    for child in &container.components {
                        if let ContainerChild::Separator(separator) = child {
                            check_separator(separator)?;
                        }
                    }
                }
                Component::Separator(separator) => check_separator(separator)?,
                Component::Text(_) => {}
            }
        }
        Ok(())
    }
}

fn check_separator(separator: &Separator) -> Result<(), ComponentError> {
    if !separator.divider && separator.spacing == SeparatorSpacing::Large {
        return Err(ComponentError::UnsupportedSpacerSpacing);
    }
    Ok(())
}

/// Builds the `/separator` reply: three labelled rows, each followed by the
/// separator style it names, inside a single accent-colored container.
pub fn separator_showcase_message() -> ReplyMessage {
    let container = Container::new()
        .accent_color(SHOWCASE_ACCENT_COLOR)
        .text_display("🔹 Small Divider")
        .separator(Separator::divider(SeparatorSpacing::Small))
        .text_display("🔸 Large Divider")
        .separator(Separator::divider(SeparatorSpacing::Large))
        .text_display("⚪ Invisible Spacer")
        .separator(Separator::spacer());
    ReplyMessage::components_v2(container)
}
