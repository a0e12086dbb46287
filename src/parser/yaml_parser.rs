use crate::{
    error::LoadYamlError, BBMap, BehaviorNodeContainer, BlackboardValue, PortType, Registry,
};
use serde_yaml::Value;
use std::collections::HashMap;

fn recurse_parse<A>(
    value: &Value,
    reg: &Registry<A>,
) -> Result<BehaviorNodeContainer<A>, LoadYamlError> {
    let name = value
        .get("type")
        .and_then(|value| value.as_str())
        .ok_or(LoadYamlError::Missing("type"))?;

    let node = reg
        .build(name)
        .ok_or_else(|| LoadYamlError::MissingNode(name.to_owned()))?;
    tracing::trace!(node = name, "building node from yaml");

    let mut blackboard_map = BBMap::new();
    if let Some(Value::Mapping(ports)) = value.get("ports") {
        for (key, value) in ports.iter() {
            if let Some((key, value)) = key.as_str().zip(value.as_str()) {
                blackboard_map.insert(
                    key.into(),
                    BlackboardValue::Ref(value.into(), PortType::InOut),
                );
            }
        }
    }
    if let Some(Value::Mapping(inputs)) = value.get("inputs") {
        for (key, value) in inputs.iter() {
            let Some(key) = key.as_str() else {
                continue;
            };
            let literal = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => {
                    tracing::warn!(node = name, port = key, "ignoring non-scalar input");
                    continue;
                }
            };
            blackboard_map.insert(key.into(), BlackboardValue::Literal(literal));
        }
    }

    let mut ret = BehaviorNodeContainer::new(node, blackboard_map).with_name(name);
    if let Some(Value::Sequence(children)) = value.get("children") {
        for child in children {
            ret.add_child(recurse_parse(child, reg)?)?;
        }
    }

    Ok(ret)
}

/// Load every tree under the `behavior_tree` key of a YAML document.
///
/// ```yaml
/// behavior_tree:
///   main:
///     type: Sequence
///     children:
///       - type: Wait
///         inputs:
///           ticks: 2
///       - type: IsTrue
///         ports:
///           input: ready
/// ```
///
/// `ports` binds a port to a blackboard variable, `inputs` to a literal.
pub fn load_yaml<A>(
    yaml: &str,
    reg: &Registry<A>,
) -> Result<HashMap<String, BehaviorNodeContainer<A>>, LoadYamlError> {
    let yaml: Value = serde_yaml::from_str(yaml)?;
    let Some(Value::Mapping(roots)) = yaml.get("behavior_tree") else {
        return Err(LoadYamlError::Missing("behavior_tree"));
    };

    roots
        .iter()
        .map(|(name, value)| {
            let name = name.as_str().ok_or(LoadYamlError::Missing("tree name"))?;
            Ok((name.to_owned(), recurse_parse(value, reg)?))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::AddChildError, BehaviorResult, Blackboard, CancellationToken, Context};

    const SOURCE: &str = r#"
behavior_tree:
  main:
    type: Sequence
    children:
      - type: SetBool
        inputs:
          value: true
        ports:
          output: ready
      - type: IsTrue
        ports:
          input: ready
      - type: Wait
        inputs:
          ticks: 1
  idle:
    type: AlwaysFailure
"#;

    #[test]
    fn test_load_yaml() {
        let reg = Registry::<()>::default();
        let mut trees = load_yaml(SOURCE, &reg).unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees["idle"].name(), "AlwaysFailure");

        let main = trees.get_mut("main").unwrap();
        let mut agent = ();
        let mut ctx = Context::new(&mut agent, Blackboard::new());
        let token = CancellationToken::new();
        assert_eq!(main.tick(&mut ctx, &token).unwrap(), BehaviorResult::Running);
        assert_eq!(main.tick(&mut ctx, &token).unwrap(), BehaviorResult::Success);
        assert_eq!(ctx.get::<bool>("ready"), Some(&true));
    }

    #[test]
    fn test_yaml_errors() {
        let reg = Registry::<()>::default();
        assert!(matches!(
            load_yaml("trees: {}", &reg),
            Err(LoadYamlError::Missing("behavior_tree"))
        ));
        assert!(matches!(
            load_yaml("behavior_tree:\n  main:\n    type: Jump\n", &reg),
            Err(LoadYamlError::MissingNode(node)) if node == "Jump"
        ));
        assert!(matches!(
            load_yaml("behavior_tree:\n  main:\n    children: []\n", &reg),
            Err(LoadYamlError::Missing("type"))
        ));
        let too_many = r#"
behavior_tree:
  main:
    type: Inverter
    children:
      - type: AlwaysSuccess
      - type: AlwaysSuccess
"#;
        assert!(matches!(
            load_yaml(too_many, &reg),
            Err(LoadYamlError::AddChildError(AddChildError::TooManyNodes))
        ));
        assert!(matches!(
            load_yaml("behavior_tree: [", &reg),
            Err(LoadYamlError::Yaml(_))
        ));
    }
}
