use std::fmt;
use std::sync::{Arc, Weak};

use crate::resources::{
    Observable, Observer, ResourceChanged, ResourceError, ResourceRef, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Digital,
    Analog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelKind {
    pub direction: Direction,
    pub signal: Signal,
}

impl ChannelKind {
    pub const DIGITAL_INPUT: ChannelKind = ChannelKind::new(Direction::Input, Signal::Digital);
    pub const ANALOG_INPUT: ChannelKind = ChannelKind::new(Direction::Input, Signal::Analog);
    pub const DIGITAL_OUTPUT: ChannelKind = ChannelKind::new(Direction::Output, Signal::Digital);
    pub const ANALOG_OUTPUT: ChannelKind = ChannelKind::new(Direction::Output, Signal::Analog);

    pub const fn new(direction: Direction, signal: Signal) -> Self {
        Self { direction, signal }
    }

    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    pub fn is_digital(&self) -> bool {
        self.signal == Signal::Digital
    }

    pub fn is_analog(&self) -> bool {
        self.signal == Signal::Analog
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signal = match self.signal {
            Signal::Digital => "digital",
            Signal::Analog => "analog",
        };
        let direction = match self.direction {
            Direction::Input => "input",
            Direction::Output => "output",
        };
        write!(f, "{} {}", signal, direction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Sent to the observers of a channel whenever its resource changed
pub struct ChannelEvent {
    /// Whether the channel could use its resource right now.
    pub enabled: bool,
}

/// A single port of a device, backed by (at most) one physical resource.
///
/// Channels claim their resource in their own name: the channel is the [`User`], identified
/// by `<device>/<channel id>`. A claimed resource keeps the channel alive until it is
/// released again.
pub struct Channel {
    name: String,
    device: String,
    id: String,
    path: String,
    kind: ChannelKind,
    resource: Option<ResourceRef>,
    observers: Observable<ChannelEvent>,
}

impl Channel {
    pub fn new(
        name: impl Into<String>,
        device: impl Into<String>,
        id: impl Into<String>,
        kind: ChannelKind,
        resource: Option<ResourceRef>,
    ) -> Arc<Self> {
        let device = device.into();
        let id = id.into();
        let path = format!("{}/{}", device, id);

        Arc::new_cyclic(|this: &Weak<Channel>| {
            if let Some(ref resource) = resource {
                let observer: Weak<dyn Observer<ResourceChanged>> = this.clone();
                resource.observers().watch_weak(observer);
            }
            Self {
                name: name.into(),
                device,
                id,
                path,
                kind,
                resource,
                observers: Observable::new(),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `<device>/<channel id>`, the path the channel claims resources under
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn resource(&self) -> Option<&ResourceRef> {
        self.resource.as_ref()
    }

    /// Could this channel use its resource right now?
    ///
    /// A channel without a physical resource is always enabled.
    pub fn enabled(&self) -> bool {
        match self.resource {
            Some(ref resource) => resource.is_available(Some(self)),
            None => true,
        }
    }

    /// Claims the channel's resource for this channel.
    pub fn claim(self: &Arc<Self>) -> Result<(), ResourceError> {
        if let Some(ref resource) = self.resource {
            resource.retain(self.clone())?;
            tracing::debug!(path = %self.path, "channel claimed its resource");
        }
        Ok(())
    }

    /// Releases the channel's resource, whoever holds it.
    pub fn release(&self) {
        if let Some(ref resource) = self.resource {
            resource.release();
        }
    }

    pub fn watch<O>(&self, observer: &Arc<O>)
    where
        O: Observer<ChannelEvent> + 'static,
    {
        self.observers.watch(observer);
    }

    pub fn unwatch<O: ?Sized>(&self, observer: &Arc<O>) {
        self.observers.unwatch(observer);
    }
}

impl User for Channel {
    fn path(&self) -> &str {
        &self.path
    }
}

impl Observer<ResourceChanged> for Channel {
    fn notify(&self, _event: &ResourceChanged) {
        let enabled = self.enabled();
        tracing::trace!(path = %self.path, enabled, "channel resource changed");
        self.observers.fire(&ChannelEvent { enabled });
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("resource", &self.resource.as_ref().map(ResourceRef::id))
            .finish()
    }
}
