//! Startup-built lookup from message kind to component codec.

use meridian_core::ComponentKind;

use super::{MessageKind, SoaCodec, MESSAGE_KIND_COUNT};

/// Component kind carried by a component batch message.
const fn component_of(kind: MessageKind) -> Option<ComponentKind> {
    match kind {
        MessageKind::Position => Some(ComponentKind::Position),
        MessageKind::Velocity => Some(ComponentKind::Velocity),
        MessageKind::Rotation => Some(ComponentKind::Rotation),
        MessageKind::Stats => Some(ComponentKind::Stats),
        MessageKind::Projectile => Some(ComponentKind::Projectile),
        MessageKind::Health => Some(ComponentKind::Health),
        MessageKind::Energy => Some(ComponentKind::Energy),
        MessageKind::Movement => Some(ComponentKind::Movement),
        MessageKind::Entities | MessageKind::Connected | MessageKind::Input | MessageKind::Acknowledge => None,
    }
}

/// Every replicated component codec, indexed by message kind.
#[derive(Clone, Debug)]
pub struct CodecRegistry {
    codecs: [Option<SoaCodec>; MESSAGE_KIND_COUNT],
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// Builds a full-field codec for every component message kind.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codecs: MessageKind::ALL.map(|kind| component_of(kind).map(SoaCodec::new)),
        }
    }

    /// Replaces the codec for `kind`'s component with a field subset.
    ///
    /// Returns `false` if `kind` carries no component or a name is unknown.
    pub fn restrict(&mut self, kind: MessageKind, fields: &[&str]) -> bool {
        let Some(component) = component_of(kind) else {
            return false;
        };
        match SoaCodec::with_fields(component, fields) {
            Some(codec) => {
                self.codecs[kind.index()] = Some(codec);
                true
            }
            None => false,
        }
    }

    /// Codec for a component batch message.
    #[inline]
    #[must_use]
    pub fn codec(&self, kind: MessageKind) -> Option<&SoaCodec> {
        self.codecs[kind.index()].as_ref()
    }

    /// Component kind a message kind carries.
    #[inline]
    #[must_use]
    pub const fn component_kind(&self, kind: MessageKind) -> Option<ComponentKind> {
        component_of(kind)
    }

    /// Message kind that carries `component`, if replicated.
    #[must_use]
    pub fn message_kind(&self, component: ComponentKind) -> Option<MessageKind> {
        MessageKind::ALL
            .into_iter()
            .find(|kind| component_of(*kind) == Some(component))
    }

    /// Component batch message kinds with their codecs, in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (MessageKind, &SoaCodec)> {
        MessageKind::ALL
            .into_iter()
            .filter_map(|kind| self.codec(kind).map(|codec| (kind, codec)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_component_message_resolves() {
        let registry = CodecRegistry::new();
        let kinds: Vec<MessageKind> = registry.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds.len(), 8);
        for (kind, codec) in registry.iter() {
            let component = registry.component_kind(kind).unwrap();
            assert_eq!(codec.kind(), component);
            assert_eq!(registry.message_kind(component), Some(kind));
        }
        assert!(registry.codec(MessageKind::Input).is_none());
        assert_eq!(registry.message_kind(ComponentKind::Sync), None);
    }

    #[test]
    fn test_restrict_to_subset() {
        let mut registry = CodecRegistry::new();
        assert!(registry.restrict(MessageKind::Stats, &["speed"]));
        assert_eq!(registry.codec(MessageKind::Stats).unwrap().record_size(), 8);
        assert!(!registry.restrict(MessageKind::Stats, &["nope"]));
        assert!(!registry.restrict(MessageKind::Connected, &[]));
    }
}
