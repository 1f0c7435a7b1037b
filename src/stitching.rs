//! Receiver stitching: inserting, moving and renaming receiver entries inside
//! an alerting configuration while keeping routes and group names consistent.
//!
//! Receiver groups are referenced by name from the routing tree, and every
//! entry of a group must carry the group's name. Group membership is treated
//! as authoritative: an entry whose own name disagrees with its group's is
//! repaired whenever it is rewritten.

use crate::core::{AlertingConfig, ReceiverEntry, ReceiverGroup, Route};
use tracing::debug;

/// An entry taken out of the document by `remove_receiver`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedReceiver {
    pub entry: ReceiverEntry,
    /// Name of the group the entry was a member of.
    pub group_name: String,
    /// Whether the group was dropped because the entry was its last member.
    pub group_removed: bool,
}

/// Stitches `target` into `config`, matching existing entries by uid.
///
/// * An unknown uid is appended to the group named `target.name`, creating the
///   group at the end of the document if needed.
/// * A known uid whose group already carries `target.name` is replaced in place.
/// * Otherwise the entry moves to the group named `target.name`. When it was
///   the sole member of its old group, routes pointing at the old group are
///   rewritten to the new name.
///
/// Returns whether the document changed.
pub fn stitch_receiver(config: &mut AlertingConfig, target: ReceiverEntry) -> bool {
    let Some((group_idx, entry_idx)) = locate(config, &target.uid) else {
        debug!(uid = %target.uid, group = %target.name, "Appending new receiver");
        append_to_group(&mut config.receivers, target);
        return true;
    };

    let group = &mut config.receivers[group_idx];
    if group.name == target.name {
        let slot = &mut group.entries[entry_idx];
        if *slot == target {
            return false;
        }
        *slot = target;
        return true;
    }

    let old_name = group.name.clone();
    let sole_member = group.entries.len() == 1;
    let destination_exists = config.receivers.iter().any(|g| g.name == target.name);
    debug!(
        uid = %target.uid,
        from = %old_name,
        to = %target.name,
        sole_member,
        "Moving receiver between groups"
    );

    if sole_member {
        if let Some(route) = config.route.as_mut() {
            replace_references(&old_name, &target.name, route);
        }
        if !destination_exists {
            // Same outcome as drop-and-recreate, but the group keeps its position.
            let group = &mut config.receivers[group_idx];
            group.name = target.name.clone();
            group.entries[entry_idx] = target;
            return true;
        }
    }

    let group = &mut config.receivers[group_idx];
    group.entries.remove(entry_idx);
    if group.entries.is_empty() {
        config.receivers.remove(group_idx);
    }
    append_to_group(&mut config.receivers, target);
    true
}

/// Removes the entry with `uid`, dropping its group if it becomes empty.
///
/// Routes are left untouched; callers check `is_contact_point_in_use` first.
pub fn remove_receiver(config: &mut AlertingConfig, uid: &str) -> Option<RemovedReceiver> {
    let (group_idx, entry_idx) = locate(config, uid)?;
    let group = &mut config.receivers[group_idx];
    let entry = group.entries.remove(entry_idx);
    let group_name = group.name.clone();
    let group_removed = group.entries.is_empty();
    if group_removed {
        config.receivers.remove(group_idx);
    }
    Some(RemovedReceiver {
        entry,
        group_name,
        group_removed,
    })
}

/// Rewrites every reference to receiver `old` in the tree rooted at `route`.
pub fn replace_references(old: &str, new: &str, route: &mut Route) {
    if route.receiver == old {
        route.receiver = new.to_string();
    }
    for child in &mut route.routes {
        replace_references(old, new, child);
    }
}

/// Whether any node of the tree rooted at `route` routes to receiver `name`.
pub fn is_contact_point_in_use(name: &str, route: &Route) -> bool {
    route.receiver == name
        || route
            .routes
            .iter()
            .any(|child| is_contact_point_in_use(name, child))
}

fn locate(config: &AlertingConfig, uid: &str) -> Option<(usize, usize)> {
    config
        .receivers
        .iter()
        .enumerate()
        .find_map(|(group_idx, group)| {
            group
                .entries
                .iter()
                .position(|entry| entry.uid == uid)
                .map(|entry_idx| (group_idx, entry_idx))
        })
}

fn append_to_group(groups: &mut Vec<ReceiverGroup>, entry: ReceiverEntry) {
    match groups.iter_mut().find(|group| group.name == entry.name) {
        Some(group) => group.entries.push(entry),
        None => groups.push(ReceiverGroup::new(entry.name.clone(), vec![entry])),
    }
}
