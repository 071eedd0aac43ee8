//! Alias resolution.
//!
//! An alias is a record carrying an `HS_ALIAS` entry whose value names
//! another identifier. Resolution follows such entries until it reaches a
//! record without one, remembering every hop so the resulting object can
//! report how it was reached.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use lapis_store::{RecordStore, StoreError};
use lapis_types::record::{tags, INDEX_RESOURCE_TYPE};
use lapis_types::{Pid, Record};
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::{LapisError, LapisResult};
use crate::object::DigitalObject;

/// Default bound on the number of alias hops followed by one lookup.
pub const DEFAULT_MAX_ALIAS_HOPS: u32 = 16;

/// Outcome of following aliases from an identifier.
#[derive(Clone, Debug)]
pub struct Resolved {
    /// Identifier of the record that is not an alias.
    pub pid: Pid,
    /// That record, as read during resolution.
    pub record: Record,
    /// Alias identifiers traversed, in the order they were followed.
    pub chain: Vec<Pid>,
}

impl Resolved {
    /// The resource type tag stored at index 2, if any.
    pub fn resource_type(&self) -> Option<&str> {
        self.record.get(&INDEX_RESOURCE_TYPE).map(|v| v.data.as_str())
    }
}

/// Follows alias records over a [`RecordStore`].
///
/// Cheap to clone; every [`DigitalObject`] carries one so it can resolve
/// the identifiers it references.
#[derive(Clone)]
pub struct AliasResolver {
    store: Arc<dyn RecordStore>,
    max_hops: u32,
}

impl AliasResolver {
    pub fn new(store: Arc<dyn RecordStore>, max_hops: u32) -> Self {
        Self { store, max_hops }
    }

    /// The underlying record store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }

    /// Follow aliases starting at `pid`.
    ///
    /// Returns `Ok(None)` if `pid` itself does not exist. Fails with
    /// [`LapisError::BrokenAlias`] if an alias points at a missing record
    /// and with [`LapisError::AliasCycle`] if an identifier repeats or the
    /// hop bound is exceeded.
    pub fn resolve(&self, pid: &Pid) -> LapisResult<Option<Resolved>> {
        let mut chain: Vec<Pid> = Vec::new();
        let mut seen: HashSet<Pid> = HashSet::new();
        let mut current = pid.clone();

        loop {
            let record = match self.store.read_all(&current) {
                Ok(record) => record,
                Err(StoreError::NotFound(_)) if chain.is_empty() => return Ok(None),
                Err(StoreError::NotFound(missing)) => {
                    return Err(LapisError::BrokenAlias { chain, missing });
                }
                Err(e) => return Err(e.into()),
            };

            let Some(target) = alias_target(&current, &record)? else {
                if !chain.is_empty() {
                    debug!(%pid, resolved = %current, hops = chain.len(), "resolved alias");
                }
                return Ok(Some(Resolved {
                    pid: current,
                    record,
                    chain,
                }));
            };

            seen.insert(current.clone());
            chain.push(current);
            if seen.contains(&target) || chain.len() > self.max_hops as usize {
                warn!(%pid, hops = chain.len(), "alias resolution aborted");
                return Err(LapisError::AliasCycle { chain });
            }
            current = target;
        }
    }

    /// Resolve `pid` and build the matching typed entity.
    pub fn lookup(&self, pid: &Pid) -> LapisResult<Option<Entity>> {
        Ok(self.resolve(pid)?.map(|resolved| {
            let kind = resolved.resource_type().map(str::to_owned);
            let object = DigitalObject::new(resolved.pid, self.clone(), resolved.chain);
            Entity::from_resource_type(object, kind.as_deref())
        }))
    }

    /// Whether the record at `pid` is an alias. Does not follow the alias.
    pub fn is_alias(&self, pid: &Pid) -> LapisResult<bool> {
        let record = self.store.read_all(pid)?;
        Ok(alias_target(pid, &record)?.is_some())
    }

    /// Handle on an identifier without checking that it exists.
    pub(crate) fn object(&self, pid: Pid) -> DigitalObject {
        DigitalObject::new(pid, self.clone(), Vec::new())
    }
}

impl fmt::Debug for AliasResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliasResolver")
            .field("max_hops", &self.max_hops)
            .finish_non_exhaustive()
    }
}

fn alias_target(pid: &Pid, record: &Record) -> LapisResult<Option<Pid>> {
    match record.values().find(|v| v.has_tag(tags::HS_ALIAS)) {
        None => Ok(None),
        Some(value) => Pid::parse(&value.data).map(Some).map_err(|e| {
            LapisError::corrupt(pid, format!("alias target is not an identifier: {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapis_store::InMemoryRecordStore;
    use lapis_types::record::INDEX_RESOURCE_LOCATION;
    use lapis_types::RecordValue;

    fn pid(s: &str) -> Pid {
        Pid::parse(s).unwrap()
    }

    fn setup() -> (Arc<InMemoryRecordStore>, AliasResolver) {
        let store = Arc::new(InMemoryRecordStore::new());
        let resolver = AliasResolver::new(store.clone(), DEFAULT_MAX_ALIAS_HOPS);
        (store, resolver)
    }

    fn make_alias(store: &InMemoryRecordStore, alias: &str, target: &str) {
        store.acquire(&pid(alias)).unwrap();
        store
            .write(&pid(alias), INDEX_RESOURCE_LOCATION, RecordValue::new(tags::HS_ALIAS, target))
            .unwrap();
    }

    #[test]
    fn missing_identifier_is_none() {
        let (_, resolver) = setup();
        assert!(resolver.resolve(&pid("10876/nothing")).unwrap().is_none());
    }

    #[test]
    fn plain_record_resolves_to_itself() {
        let (store, resolver) = setup();
        store.acquire(&pid("10876/a")).unwrap();
        let resolved = resolver.resolve(&pid("10876/a")).unwrap().unwrap();
        assert_eq!(resolved.pid, pid("10876/a"));
        assert!(resolved.chain.is_empty());
    }

    #[test]
    fn chain_is_reported_in_order() {
        let (store, resolver) = setup();
        store.acquire(&pid("10876/orig")).unwrap();
        make_alias(&store, "10876/alias1", "10876/orig");
        make_alias(&store, "10876/alias2", "10876/alias1");

        let resolved = resolver.resolve(&pid("10876/alias2")).unwrap().unwrap();
        assert_eq!(resolved.pid, pid("10876/orig"));
        assert_eq!(resolved.chain, vec![pid("10876/alias2"), pid("10876/alias1")]);
    }

    #[test]
    fn broken_alias() {
        let (store, resolver) = setup();
        make_alias(&store, "10876/dangling", "10876/gone");
        let err = resolver.resolve(&pid("10876/dangling")).unwrap_err();
        match err {
            LapisError::BrokenAlias { chain, missing } => {
                assert_eq!(chain, vec![pid("10876/dangling")]);
                assert_eq!(missing, pid("10876/gone"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cycle_is_detected() {
        let (store, resolver) = setup();
        make_alias(&store, "10876/x", "10876/y");
        make_alias(&store, "10876/y", "10876/x");
        let err = resolver.resolve(&pid("10876/x")).unwrap_err();
        assert!(matches!(err, LapisError::AliasCycle { chain } if chain.len() == 2));
    }

    #[test]
    fn self_alias_is_a_cycle() {
        let (store, resolver) = setup();
        make_alias(&store, "10876/self", "10876/self");
        assert!(matches!(
            resolver.resolve(&pid("10876/self")),
            Err(LapisError::AliasCycle { .. })
        ));
    }

    #[test]
    fn hop_bound_is_enforced() {
        let store = Arc::new(InMemoryRecordStore::new());
        let resolver = AliasResolver::new(store.clone(), 2);
        store.acquire(&pid("10876/end")).unwrap();
        make_alias(&store, "10876/h1", "10876/end");
        make_alias(&store, "10876/h2", "10876/h1");
        make_alias(&store, "10876/h3", "10876/h2");

        assert!(resolver.resolve(&pid("10876/h2")).unwrap().is_some());
        assert!(matches!(
            resolver.resolve(&pid("10876/h3")),
            Err(LapisError::AliasCycle { .. })
        ));
    }

    #[test]
    fn is_alias_does_not_follow() {
        let (store, resolver) = setup();
        store.acquire(&pid("10876/orig")).unwrap();
        make_alias(&store, "10876/al", "10876/orig");
        assert!(resolver.is_alias(&pid("10876/al")).unwrap());
        assert!(!resolver.is_alias(&pid("10876/orig")).unwrap());
        assert!(matches!(
            resolver.is_alias(&pid("10876/none")),
            Err(LapisError::NotFound(_))
        ));
    }

    #[test]
    fn garbage_alias_target_is_corrupt() {
        let (store, resolver) = setup();
        make_alias(&store, "10876/bad", "no slash here");
        assert!(matches!(
            resolver.resolve(&pid("10876/bad")),
            Err(LapisError::CorruptRecord { .. })
        ));
    }
}
