//! Member aggregation and entry resolution.
//!
//! Marked members are keyed by a normalized id. When several members share an
//! id, the getter and setter roles are resolved independently: the member of
//! the highest kind priority (method, then property, then field) wins a role,
//! and among members of equal priority the latest declaration wins.

use std::collections::BTreeSet;

use tracing::{Level, event};

use crate::core::config::GeneratorConfig;
use crate::core::error::{Result, SaveGenError};
use crate::model::{Entry, EntryTable, MarkedMember, PersistenceMode, TypeDeclaration};
use crate::naming::{to_snake_case, trim_decorations};

/// Identifier a marked member registers under.
pub fn derive_id(member: &MarkedMember, config: &GeneratorConfig) -> String {
    if let Some(identifier) = &member.marker.identifier {
        return to_snake_case(identifier);
    }
    if member.is_method() {
        return to_snake_case(&trim_decorations(&member.declared_name, &config.accessor_prefixes));
    }
    to_snake_case(&member.declared_name)
}

/// Ingests the marked members of a type, skipping the `excluded` member indices.
pub fn collect_marked_members(ty: &TypeDeclaration, excluded: &BTreeSet<usize>) -> Vec<MarkedMember> {
    ty.members
        .iter()
        .enumerate()
        .filter(|(index, _)| !excluded.contains(index))
        .filter_map(|(index, member)| MarkedMember::ingest(&ty.name, index, member))
        .collect()
}

fn claims(current: Option<&MarkedMember>, candidate: &MarkedMember) -> bool {
    current.is_none_or(|current| candidate.descriptor.priority() >= current.descriptor.priority())
}

/// Resolves marked members into entries, in first-insertion order of their ids.
///
/// Members capable of neither role are ignored. The input order is the
/// declaration order the tie-break relies on.
pub fn aggregate(
    ty: &TypeDeclaration,
    members: &[MarkedMember],
    config: &GeneratorConfig,
) -> Result<EntryTable> {
    let mut entries = EntryTable::new();

    for member in members.iter().filter(|member| member.roles.any()) {
        let id = derive_id(member, config);
        let entry = entries
            .entry(id.clone())
            .or_insert_with(|| Entry::new(id.clone()));

        if member.roles.get && claims(entry.getter.as_ref(), member) {
            entry.getter = Some(member.clone());
        }
        if member.roles.set && claims(entry.setter.as_ref(), member) {
            entry.setter = Some(member.clone());
        }
    }

    for entry in entries.values_mut() {
        if entry.is_empty() {
            return Err(SaveGenError::EmptyEntry(entry.id.clone()));
        }
        let persistent = [&entry.getter, &entry.setter]
            .into_iter()
            .flatten()
            .any(|member| member.marker.mode == PersistenceMode::Persistent);
        if persistent {
            entry.mode = PersistenceMode::Persistent;
        }
    }

    event!(
        Level::DEBUG,
        type_name = %ty.name,
        members = members.len(),
        entries = entries.len(),
        "entries resolved"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Marker, MemberDeclaration};

    fn resolve(ty: &TypeDeclaration) -> EntryTable {
        let members = collect_marked_members(ty, &BTreeSet::new());
        aggregate(ty, &members, &GeneratorConfig::new()).unwrap()
    }

    fn getter_of<'a>(entries: &'a EntryTable, id: &str) -> Option<&'a str> {
        entries[id].getter.as_ref().map(|member| member.symbol.as_str())
    }

    fn setter_of<'a>(entries: &'a EntryTable, id: &str) -> Option<&'a str> {
        entries[id].setter.as_ref().map(|member| member.symbol.as_str())
    }

    #[test]
    fn test_derive_id() {
        let config = GeneratorConfig::new();
        let ingest = |member: MemberDeclaration| MarkedMember::ingest("T", 0, &member).unwrap();

        assert_eq!(derive_id(&ingest(MemberDeclaration::field("_position", "V").saved()), &config), "position");
        assert_eq!(derive_id(&ingest(MemberDeclaration::getter("GetDrag", "f32").saved()), &config), "drag");
        assert_eq!(derive_id(&ingest(MemberDeclaration::property("MaxHealth", "i32").saved()), &config), "max_health");
        assert_eq!(
            derive_id(
                &ingest(MemberDeclaration::field("hp", "i32").marked(Marker::new().identifier("HitPoints"))),
                &config
            ),
            "hit_points"
        );
        // Fields keep accessor-looking prefixes.
        assert_eq!(derive_id(&ingest(MemberDeclaration::field("GetReady", "bool").saved()), &config), "get_ready");
    }

    #[test]
    fn test_field_and_method_pair() {
        let ty = TypeDeclaration::class("Ship")
            .with_member(MemberDeclaration::field("_position", "Vector3").saved())
            .with_member(MemberDeclaration::getter("GetDrag", "f32").saved())
            .with_member(MemberDeclaration::setter("SetDrag", "f32").saved());
        let entries = resolve(&ty);

        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["position", "drag"]);
        assert_eq!(getter_of(&entries, "position"), Some("_position"));
        assert_eq!(setter_of(&entries, "position"), Some("_position"));
        assert_eq!(getter_of(&entries, "drag"), Some("GetDrag"));
        assert_eq!(setter_of(&entries, "drag"), Some("SetDrag"));
    }

    #[test]
    fn test_method_outranks_property_and_field_per_role() {
        let ty = TypeDeclaration::class("Ship")
            .with_member(MemberDeclaration::setter("SetDrag", "f32").saved())
            .with_member(MemberDeclaration::property("Drag", "f32").saved())
            .with_member(MemberDeclaration::field("drag", "f32").saved());
        let entries = resolve(&ty);

        assert_eq!(entries.len(), 1);
        assert_eq!(getter_of(&entries, "drag"), Some("Drag"));
        assert_eq!(setter_of(&entries, "drag"), Some("SetDrag"));
    }

    #[test]
    fn test_equal_priority_last_declaration_wins() {
        let ty = TypeDeclaration::class("Ship")
            .with_member(MemberDeclaration::field("speed", "f32").saved())
            .with_member(MemberDeclaration::field("_speed", "f32").saved())
            .with_member(MemberDeclaration::field("__speed", "f32").read_only().saved());
        let entries = resolve(&ty);

        assert_eq!(getter_of(&entries, "speed"), Some("__speed"));
        assert_eq!(setter_of(&entries, "speed"), Some("_speed"));
    }

    #[test]
    fn test_field_getter_with_method_setter() {
        let ty = TypeDeclaration::class("Ship")
            .with_member(MemberDeclaration::field("_fuel", "f32").read_only().saved())
            .with_member(MemberDeclaration::setter("SetFuel", "f32").saved());
        let entries = resolve(&ty);

        assert_eq!(getter_of(&entries, "fuel"), Some("_fuel"));
        assert_eq!(setter_of(&entries, "fuel"), Some("SetFuel"));
    }

    #[test]
    fn test_setter_only_entry() {
        let ty = TypeDeclaration::class("Ship")
            .with_member(MemberDeclaration::setter("SetVelocity", "Vector3").saved());
        let entries = resolve(&ty);

        assert_eq!(getter_of(&entries, "velocity"), None);
        assert_eq!(setter_of(&entries, "velocity"), Some("SetVelocity"));
    }

    #[test]
    fn test_insertion_order_is_first_seen() {
        let ty = TypeDeclaration::class("Ship")
            .with_member(MemberDeclaration::field("b", "i32").saved())
            .with_member(MemberDeclaration::field("a", "i32").saved())
            .with_member(MemberDeclaration::getter("GetB", "i32").saved());
        let entries = resolve(&ty);
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(getter_of(&entries, "b"), Some("GetB"));
    }

    #[test]
    fn test_excluded_and_roleless_members_are_ignored() {
        let ty = TypeDeclaration::class("Ship")
            .with_member(MemberDeclaration::method("GetNothing", None, &[]).saved())
            .with_member(MemberDeclaration::field("hp", "i32").saved())
            .with_member(MemberDeclaration::field("mp", "i32").saved());
        let members = collect_marked_members(&ty, &BTreeSet::from([2]));
        let entries = aggregate(&ty, &members, &GeneratorConfig::new()).unwrap();
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["hp"]);
    }

    #[test]
    fn test_persistent_mode_from_either_role() {
        let ty = TypeDeclaration::class("Ship")
            .with_member(MemberDeclaration::getter("GetFuel", "f32").saved())
            .with_member(MemberDeclaration::setter("SetFuel", "f32").marked(Marker::new().persistent()));
        let entries = resolve(&ty);
        assert_eq!(entries["fuel"].mode, PersistenceMode::Persistent);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let ty = TypeDeclaration::class("Ship")
            .with_member(MemberDeclaration::field("_z", "i32").saved())
            .with_member(MemberDeclaration::field("_y", "i32").saved())
            .with_member(MemberDeclaration::setter("SetZ", "i32").saved())
            .with_member(MemberDeclaration::getter("GetX", "i32").saved());
        assert_eq!(resolve(&ty), resolve(&ty));
    }
}
