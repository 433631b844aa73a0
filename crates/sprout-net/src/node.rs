use crate::activation::ActivationRef;
use crate::ids::ActivationId;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeType {
    Input,
    Hidden,
    Output,
    Bias,
}

/// A node of the mutable network.
///
/// Stores the raw (pre-activation) value; the activated value is computed on
/// read. Input and bias nodes never carry an activation — a bias node holds a
/// caller-supplied constant and receives no incoming edges.
#[derive(Debug, Clone)]
pub struct Node {
    node_type: NodeType,
    activation: Option<ActivationRef>,
    value: f32,
}

impl Node {
    pub fn new(node_type: NodeType) -> Self {
        Node {
            node_type,
            activation: None,
            value: 0.0,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub(crate) fn set_node_type(&mut self, node_type: NodeType) {
        self.node_type = node_type;
    }

    pub fn is_input_or_bias(&self) -> bool {
        matches!(self.node_type, NodeType::Input | NodeType::Bias)
    }

    /// The stored raw value.
    pub fn raw_value(&self) -> f32 {
        self.value
    }

    /// The activated value: the node's activation applied to the raw value,
    /// or the raw value itself when no activation is set.
    pub fn value(&self) -> f32 {
        match &self.activation {
            Some(activation) => activation.activate(self.value),
            None => self.value,
        }
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    pub fn activation(&self) -> Option<&ActivationRef> {
        self.activation.as_ref()
    }

    pub fn activation_id(&self) -> ActivationId {
        self.activation
            .as_ref()
            .map(|a| a.id())
            .unwrap_or(ActivationId::INVALID)
    }

    pub fn set_activation(&mut self, activation: Option<ActivationRef>) {
        debug_assert!(
            !self.is_input_or_bias() || activation.is_none(),
            "input and bias nodes do not apply an activation"
        );
        self.activation = activation;
    }

    pub fn has_same_activation(&self, other: &ActivationRef) -> bool {
        self.activation
            .as_ref()
            .is_some_and(|a| Arc::ptr_eq(a, other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;

    #[test]
    fn value_applies_activation_on_read() {
        let mut node = Node::new(NodeType::Hidden);
        node.set_activation(Some(Arc::new(Activation::relu())));
        node.set_value(-3.0);
        assert_eq!(node.raw_value(), -3.0);
        assert_eq!(node.value(), 0.0);
    }

    #[test]
    fn value_without_activation_is_raw() {
        let mut node = Node::new(NodeType::Input);
        node.set_value(0.25);
        assert_eq!(node.value(), 0.25);
        assert_eq!(node.activation_id(), ActivationId::INVALID);
    }
}
