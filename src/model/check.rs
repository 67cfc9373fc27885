use super::{ClassInfo, ElementInfo, IdKind, PropertyInfo, PropertyKind, Target};
use crate::name::QName;
use std::collections::{HashMap, HashSet};

/// Lists every inconsistency of a model. An empty list means the model can be
/// linked.
///
/// With `strict`, references to classes that are not part of the model are
/// problems too.
pub(crate) fn check_model(classes: &[ClassInfo], elements: &[ElementInfo], strict: bool) -> Vec<String> {
    let mut problems = Vec::new();
    let mut by_name: HashMap<&str, &ClassInfo> = HashMap::new();
    for class in classes {
        if by_name.insert(&class.name, class).is_some() {
            problems.push(format!("class '{}' is declared twice", class.name));
        }
    }

    let known_elements: HashSet<&QName> = classes
        .iter()
        .filter_map(|c| c.element_name.as_ref())
        .chain(elements.iter().map(|e| &e.name))
        .collect();

    for class in classes {
        let mut declared = HashSet::new();
        for property in &class.properties {
            if !declared.insert(property.name.as_str()) {
                problems.push(format!(
                    "class '{}' declares property '{}' twice",
                    class.name, property.name
                ));
            }
        }
        match chain_of(class, &by_name) {
            Ok(chain) => check_chain(class, &chain, &mut problems),
            Err(problem) => problems.push(problem),
        }
        for property in &class.properties {
            check_property(class, property, &by_name, &known_elements, strict, &mut problems);
        }
    }

    for element in elements {
        if strict {
            check_target(&element.target, &by_name, &mut problems, || {
                format!("element {}", element.name)
            });
        }
    }
    problems
}

/// Classes from the root of the hierarchy down to `class`
fn chain_of<'a>(class: &'a ClassInfo, by_name: &HashMap<&str, &'a ClassInfo>) -> Result<Vec<&'a ClassInfo>, String> {
    let mut chain = vec![class];
    let mut current = class;
    while let Some(base) = &current.base {
        let parent = *by_name
            .get(base.as_str())
            .ok_or_else(|| format!("class '{}' extends unknown class '{}'", current.name, base))?;
        if chain.iter().any(|c| c.name == parent.name) {
            return Err(format!("class '{}' is part of an inheritance cycle", class.name));
        }
        if parent.is_final {
            return Err(format!("class '{}' extends final class '{}'", current.name, parent.name));
        }
        chain.push(parent);
        current = parent;
    }
    chain.reverse();
    Ok(chain)
}

/// Rules that span the inheritance chain; only problems involving a property
/// declared by `class` itself are reported, so that each is reported once
fn check_chain(class: &ClassInfo, chain: &[&ClassInfo], problems: &mut Vec<String>) {
    let properties: Vec<(&ClassInfo, &PropertyInfo)> = chain
        .iter()
        .flat_map(|c| c.properties.iter().map(move |p| (*c, p)))
        .collect();

    let values: Vec<_> = properties.iter().filter(|(_, p)| p.is_value()).collect();
    let own_value = class.has_value_property();
    if values.len() > 1 && own_value {
        problems.push(format!(
            "class '{}' has more than one value property in its hierarchy",
            class.name
        ));
    }
    if own_value {
        if let Some((owner, p)) = properties
            .iter()
            .find(|(_, p)| !matches!(p.kind, PropertyKind::Value { .. } | PropertyKind::Attribute { .. }))
        {
            problems.push(format!(
                "class '{}' has a value property and element property '{}' (declared by '{}')",
                class.name, p.name, owner.name
            ));
        }
    }

    let ids = properties.iter().filter(|(_, p)| p.id == IdKind::Id).count();
    if ids > 1 && class.properties.iter().any(|p| p.id == IdKind::Id) {
        problems.push(format!("class '{}' has more than one ID property", class.name));
    }

    let mut claimed: HashMap<&QName, &str> = HashMap::new();
    for (_, property) in &properties {
        let names = match property.wrapper() {
            Some(w) => vec![&w.name],
            None => property.element_names(),
        };
        for name in names {
            if let Some(other) = claimed.insert(name, &property.name) {
                if class.properties.iter().any(|p| p.name == property.name || p.name == other) {
                    problems.push(format!(
                        "element {} of class '{}' is claimed by properties '{}' and '{}'",
                        name, class.name, other, property.name
                    ));
                }
            }
        }
    }
}

fn check_property(
    class: &ClassInfo,
    property: &PropertyInfo,
    by_name: &HashMap<&str, &ClassInfo>,
    known_elements: &HashSet<&QName>,
    strict: bool,
    problems: &mut Vec<String>,
) {
    let what = || format!("property '{}' of class '{}'", property.name, class.name);
    if property.wrapper().is_some() && property.collection.is_none() {
        problems.push(format!("{} has a wrapper element but is not a collection", what()));
    }
    match &property.kind {
        PropertyKind::Attribute { target, .. } | PropertyKind::Value { target } => match target {
            Target::Class(_) if property.id == IdKind::IdRef => {
                if strict {
                    check_target(target, by_name, problems, what);
                }
            }
            Target::Class(_) | Target::Any => {
                problems.push(format!("{} must have a leaf type, found {}", what(), target.describe()))
            }
            _ => {}
        },
        PropertyKind::Element { types, .. } => {
            if types.is_empty() {
                problems.push(format!("{} declares no element name", what()));
            }
            for t in types {
                if strict {
                    check_target(&t.target, by_name, problems, what);
                }
                if property.list && !t.target.is_leaf() && property.id != IdKind::IdRef {
                    problems.push(format!("{} is a list of non-leaf values", what()));
                }
            }
        }
        PropertyKind::Reference { elements, wildcard, .. } => {
            if elements.is_empty() && wildcard.is_none() {
                problems.push(format!("{} references no element", what()));
            }
            if strict {
                for name in elements {
                    if !known_elements.contains(name) {
                        problems.push(format!("{} references undeclared element {}", what(), name));
                    }
                }
            }
        }
        PropertyKind::Map { key, value, .. } => {
            if !key.is_leaf() {
                problems.push(format!("{} must have leaf keys, found {}", what(), key.describe()));
            }
            if strict {
                check_target(value, by_name, problems, what);
            }
        }
    }
    if property.id == IdKind::Id && !matches!(property_target(property), Some(Target::Leaf(_))) {
        problems.push(format!("{} is an ID but not a leaf value", what()));
    }
    if property.id == IdKind::IdRef && matches!(property_target(property), Some(Target::Leaf(_) | Target::Enum(_))) {
        problems.push(format!("{} is an IDREF but refers to a leaf type", what()));
    }
}

fn property_target(property: &PropertyInfo) -> Option<&Target> {
    match &property.kind {
        PropertyKind::Attribute { target, .. } | PropertyKind::Value { target } => Some(target),
        PropertyKind::Element { types, .. } => types.first().map(|t| &t.target),
        _ => None,
    }
}

fn check_target<F>(target: &Target, by_name: &HashMap<&str, &ClassInfo>, problems: &mut Vec<String>, what: F)
where
    F: FnOnce() -> String,
{
    if let Target::Class(name) = target {
        if !by_name.contains_key(name.as_str()) {
            problems.push(format!("{} refers to unknown class '{}'", what(), name));
        }
    }
}
