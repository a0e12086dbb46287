use crate::Symbol;

/// Direction of data flow between a node and the blackboard.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PortType {
    Input,
    Output,
    InOut,
}

impl PortType {
    pub fn readable(self) -> bool {
        matches!(self, Self::Input | Self::InOut)
    }

    pub fn writable(self) -> bool {
        matches!(self, Self::Output | Self::InOut)
    }
}

/// A port a node declares through [`crate::BehaviorNode::provided_ports`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PortSpec {
    pub ty: PortType,
    pub key: Symbol,
}

impl PortSpec {
    pub fn new_in(key: impl Into<Symbol>) -> Self {
        Self {
            ty: PortType::Input,
            key: key.into(),
        }
    }

    pub fn new_out(key: impl Into<Symbol>) -> Self {
        Self {
            ty: PortType::Output,
            key: key.into(),
        }
    }

    pub fn new_inout(key: impl Into<Symbol>) -> Self {
        Self {
            ty: PortType::InOut,
            key: key.into(),
        }
    }
}
