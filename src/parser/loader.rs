use super::nom_parser::{BlackboardValue, TreeDef, TreeSource};
use crate::{error::LoadError, BBMap, BehaviorNodeContainer, Registry};

/// Instantiate the tree called `name` from a parsed tree source.
///
/// `check_ports` enables static checking of port availability before actually ticking.
/// It is useful to catch errors in a behavior tree source file, but you need to
/// implement [`crate::BehaviorNode::provided_ports`] to use it.
pub fn load<A>(
    tree_source: &TreeSource,
    registry: &Registry<A>,
    name: &str,
    check_ports: bool,
) -> Result<BehaviorNodeContainer<A>, LoadError> {
    let tree = tree_source
        .tree(name)
        .ok_or_else(|| LoadError::MissingTree(name.to_owned()))?;

    tracing::debug!(tree = name, "instantiating behavior tree");
    load_recurse(&tree.root, registry, check_ports)
}

fn load_recurse<A>(
    def: &TreeDef,
    registry: &Registry<A>,
    check_ports: bool,
) -> Result<BehaviorNodeContainer<A>, LoadError> {
    let node = registry
        .build(def.ty)
        .ok_or_else(|| LoadError::MissingNode(def.ty.to_owned()))?;

    let provided_ports = node.provided_ports();
    let mut bbmap = BBMap::new();
    for entry in def.port_maps.iter() {
        if check_ports {
            if let Some(port) = provided_ports.iter().find(|p| p.key == entry.node_port) {
                if port.ty != entry.ty {
                    return Err(LoadError::PortIOUnmatch {
                        node: def.ty.to_owned(),
                        port: entry.node_port.to_owned(),
                    });
                }
            } else {
                return Err(LoadError::PortUnmatch {
                    node: def.ty.to_owned(),
                    port: entry.node_port.to_owned(),
                });
            }
        }
        bbmap.insert(
            entry.node_port.into(),
            match entry.blackboard_value {
                BlackboardValue::Ref(value) => crate::BlackboardValue::Ref(value.into(), entry.ty),
                BlackboardValue::Literal(ref value) => {
                    crate::BlackboardValue::Literal(value.clone())
                }
            },
        );
    }

    let mut ret = BehaviorNodeContainer::new(node, bbmap).with_name(def.ty);
    for child in &def.children {
        let child_node = load_recurse(child, registry, check_ports)?;
        ret.add_child(child_node)
            .map_err(|e| LoadError::AddChildError(e, def.ty.to_string()))?;
    }

    Ok(ret)
}
