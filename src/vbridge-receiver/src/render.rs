use vbridge_registry::Component;
use vbridge_wire::{NodeId, Value};

use crate::tree::Receiver;

/// A resolved node ready for the Host's UI framework to mount: its
/// component, filtered props, and already-rendered children.
#[derive(Debug, Clone)]
pub struct RenderedNode {
    pub id: NodeId,
    pub component: Component,
    pub props: Value,
    pub children: Vec<RenderedNode>,
}

/// `render()`'s return shape (spec.md §4.6): the root container may have
/// no children, exactly one, or several — React's own "a component may
/// return a fragment" shape, generalized to the container itself.
#[derive(Debug, Clone)]
pub enum RenderOutput {
    Empty,
    Single(RenderedNode),
    Fragment(Vec<RenderedNode>),
}

impl Receiver {
    /// Build the current tree's render view. Unknown component types are
    /// skipped (warn-once, spec.md §4.5) rather than aborting the whole
    /// render — one bad node shouldn't blank the screen.
    pub fn render(&mut self) -> RenderOutput {
        let root_children: Vec<NodeId> = self
            .get(NodeId::ROOT)
            .map(|root| root.children.clone())
            .unwrap_or_default();

        let mut rendered: Vec<RenderedNode> = Vec::new();
        for child in root_children {
            if let Some(node) = self.render_node(child) {
                rendered.push(node);
            }
        }

        match rendered.len() {
            0 => RenderOutput::Empty,
            1 => RenderOutput::Single(rendered.into_iter().next().unwrap()),
            _ => RenderOutput::Fragment(rendered),
        }
    }

    fn render_node(&mut self, id: NodeId) -> Option<RenderedNode> {
        let node = self.get(id)?.clone();
        let component = self.resolve_component(&node.node_type)?;
        let children = node
            .children
            .iter()
            .filter_map(|child_id| self.render_node(*child_id))
            .collect();
        Some(RenderedNode {
            id: node.id,
            component,
            props: node.props,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbridge_registry::ComponentRegistry;
    use vbridge_wire::{Operation, OperationBatch};

    fn receiver_with(components: &[&str]) -> Receiver {
        let mut registry = ComponentRegistry::new(false);
        for name in components {
            registry.register(*name, Component { name: (*name).to_string() });
        }
        Receiver::new(registry, None)
    }

    #[test]
    fn empty_tree_renders_empty() {
        let mut receiver = receiver_with(&[]);
        assert!(matches!(receiver.render(), RenderOutput::Empty));
    }

    #[test]
    fn single_root_child_renders_single() {
        let mut receiver = receiver_with(&["View"]);
        receiver
            .apply_batch(OperationBatch::new(
                1,
                vec![
                    Operation::Create {
                        id: NodeId(1),
                        node_type: "View".into(),
                        serialized_props: Value::Object(Default::default()),
                    },
                    Operation::Append { parent_id: NodeId::ROOT, child_id: NodeId(1) },
                ],
            ))
            .unwrap();
        assert!(matches!(receiver.render(), RenderOutput::Single(_)));
    }

    #[test]
    fn multiple_root_children_render_fragment() {
        let mut receiver = receiver_with(&["View"]);
        receiver
            .apply_batch(OperationBatch::new(
                1,
                vec![
                    Operation::Create { id: NodeId(1), node_type: "View".into(), serialized_props: Value::Object(Default::default()) },
                    Operation::Create { id: NodeId(2), node_type: "View".into(), serialized_props: Value::Object(Default::default()) },
                    Operation::Append { parent_id: NodeId::ROOT, child_id: NodeId(1) },
                    Operation::Append { parent_id: NodeId::ROOT, child_id: NodeId(2) },
                ],
            ))
            .unwrap();
        assert!(matches!(receiver.render(), RenderOutput::Fragment(children) if children.len() == 2));
    }

    #[test]
    fn unknown_component_is_skipped_not_fatal() {
        let mut receiver = receiver_with(&[]);
        receiver
            .apply_batch(OperationBatch::new(
                1,
                vec![
                    Operation::Create { id: NodeId(1), node_type: "Mystery".into(), serialized_props: Value::Object(Default::default()) },
                    Operation::Append { parent_id: NodeId::ROOT, child_id: NodeId(1) },
                ],
            ))
            .unwrap();
        assert!(matches!(receiver.render(), RenderOutput::Empty));
    }
}
