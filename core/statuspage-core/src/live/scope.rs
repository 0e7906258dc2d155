use statuspage_protocol::{EntityKind, Event, RecordId};

use crate::auth::ViewerContext;

use super::FetchTarget;

/// The (organization, entity, optional record) a view is restricted to.
///
/// Fixed at mount. A mismatch is the normal case on a shared feed and is
/// never treated as a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerScope {
    org_id: Option<String>,
    entity: EntityKind,
    subject_id: Option<RecordId>,
}

impl ViewerScope {
    pub fn new(org_id: Option<String>, entity: EntityKind, subject_id: Option<RecordId>) -> Self {
        ViewerScope {
            org_id,
            entity,
            subject_id,
        }
    }

    pub fn for_target(viewer: &ViewerContext, target: FetchTarget) -> Self {
        ViewerScope::new(viewer.org_id.clone(), target.entity(), target.subject_id())
    }

    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn subject_id(&self) -> Option<RecordId> {
        self.subject_id
    }

    pub fn matches(&self, event: &Event) -> bool {
        let org_id = match self.org_id.as_deref() {
            Some(org_id) => org_id,
            None => return false,
        };
        if event.scope_org_id != org_id || event.entity != self.entity {
            return false;
        }
        match self.subject_id {
            Some(subject_id) => event.target_id() == Some(subject_id),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statuspage_protocol::Record;

    fn created(org: &str, id: i64) -> Event {
        Event::created(org, EntityKind::Incident, Record::new(id, "investigating"))
    }

    #[test]
    fn matches_same_org_and_entity() {
        let scope = ViewerScope::new(Some("org1".to_string()), EntityKind::Incident, None);
        assert!(scope.matches(&created("org1", 5)));
    }

    #[test]
    fn rejects_foreign_org() {
        let scope = ViewerScope::new(Some("org1".to_string()), EntityKind::Incident, None);
        assert!(!scope.matches(&created("org2", 5)));
    }

    #[test]
    fn rejects_org_prefix_lookalikes() {
        let scope = ViewerScope::new(Some("org".to_string()), EntityKind::Incident, None);
        assert!(!scope.matches(&created("org_1", 5)));
    }

    #[test]
    fn rejects_other_entity() {
        let scope = ViewerScope::new(Some("org1".to_string()), EntityKind::Service, None);
        assert!(!scope.matches(&created("org1", 5)));
    }

    #[test]
    fn unresolved_org_matches_nothing() {
        let scope = ViewerScope::new(None, EntityKind::Incident, None);
        assert!(!scope.matches(&created("org1", 5)));
        assert!(!scope.matches(&created("", 5)));
    }

    #[test]
    fn subject_scope_rejects_other_records() {
        let scope = ViewerScope::new(
            Some("org1".to_string()),
            EntityKind::Incident,
            Some(RecordId(5)),
        );
        assert!(scope.matches(&Event::deleted("org1", EntityKind::Incident, RecordId(5))));
        assert!(!scope.matches(&Event::deleted("org1", EntityKind::Incident, RecordId(6))));
    }

    #[test]
    fn built_from_viewer_and_target() {
        let viewer = ViewerContext::new(Some("org1".to_string()), crate::auth::Role::Admin);
        let scope =
            ViewerScope::for_target(&viewer, FetchTarget::Record(EntityKind::Service, RecordId(3)));
        assert_eq!(scope.org_id(), Some("org1"));
        assert_eq!(scope.entity(), EntityKind::Service);
        assert_eq!(scope.subject_id(), Some(RecordId(3)));
    }
}
