//! The infrastructure facade: creating, looking up and deleting objects.

use std::sync::{Arc, Mutex};

use lapis_store::{InMemoryRecordStore, RecordStore, StoreError};
use lapis_types::record::{tags, INDEX_RESOURCE_LOCATION};
use lapis_types::{Pid, RecordValue};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::array::DigitalObjectArray;
use crate::config::InfraConfig;
use crate::entity::{CollectionKind, Entity};
use crate::error::{LapisError, LapisResult};
use crate::linked_list::DigitalObjectLinkedList;
use crate::object::DigitalObject;
use crate::resolver::AliasResolver;
use crate::set::DigitalObjectSet;

/// Entry point for working with digital objects on one record store.
pub struct Infrastructure {
    resolver: AliasResolver,
    config: InfraConfig,
    rng: Mutex<StdRng>,
}

impl Infrastructure {
    pub fn new(store: Arc<dyn RecordStore>, config: InfraConfig) -> LapisResult<Self> {
        config.validate()?;
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            resolver: AliasResolver::new(store, config.max_alias_hops),
            config,
            rng: Mutex::new(rng),
        })
    }

    /// An infrastructure over a fresh in-memory store.
    pub fn in_memory(config: InfraConfig) -> LapisResult<Self> {
        Self::new(Arc::new(InMemoryRecordStore::new()), config)
    }

    pub fn config(&self) -> &InfraConfig {
        &self.config
    }

    pub fn resolver(&self) -> &AliasResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        self.resolver.store()
    }

    /// Validate `raw` and apply the configured infix.
    pub fn prepare_identifier(&self, raw: &str) -> LapisResult<Pid> {
        let pid = Pid::parse(raw)?;
        Ok(self.apply_infix(pid))
    }

    fn apply_infix(&self, pid: Pid) -> Pid {
        match &self.config.identifier_infix {
            Some(infix) => pid.with_infix(infix),
            None => pid,
        }
    }

    fn acquire(&self, identifier: Option<&str>) -> LapisResult<Pid> {
        if let Some(raw) = identifier {
            let pid = self.prepare_identifier(raw)?;
            return Ok(self.store().acquire(&pid)?);
        }

        let prefix = self.config.prefix.as_deref().ok_or_else(|| {
            LapisError::Config("a prefix is required to generate identifiers".into())
        })?;
        for attempt in 1..=self.config.max_create_attempts {
            let candidate = {
                let mut rng = self
                    .rng
                    .lock()
                    .map_err(|e| LapisError::Internal(format!("lock poisoned: {e}")))?;
                Pid::random(prefix, &mut *rng)?
            };
            let candidate = self.apply_infix(candidate);
            match self.store().acquire(&candidate) {
                Ok(pid) => return Ok(pid),
                Err(StoreError::AlreadyExists(_)) => {
                    debug!(pid = %candidate, attempt, "random identifier taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LapisError::capacity(
            format!("random identifier attempts under prefix {prefix}"),
            u64::from(self.config.max_create_attempts),
        ))
    }

    /// Create a plain object. Without an identifier a random one is
    /// generated under the configured prefix.
    pub fn create_object(&self, identifier: Option<&str>) -> LapisResult<DigitalObject> {
        let pid = self.acquire(identifier)?;
        debug!(%pid, "created object");
        Ok(self.resolver.object(pid))
    }

    /// Create an object of the given kind.
    pub fn create(&self, identifier: Option<&str>, kind: CollectionKind) -> LapisResult<Entity> {
        let object = self.create_object(identifier)?;
        Ok(match kind {
            CollectionKind::Plain => Entity::Plain(object),
            CollectionKind::Set => Entity::Set(DigitalObjectSet::create(object)?),
            CollectionKind::Array => Entity::Array(DigitalObjectArray::create(object)?),
            CollectionKind::LinkedList => {
                Entity::LinkedList(DigitalObjectLinkedList::create(object)?)
            }
        })
    }

    pub fn create_set(&self, identifier: Option<&str>) -> LapisResult<DigitalObjectSet> {
        DigitalObjectSet::create(self.create_object(identifier)?)
    }

    pub fn create_array(&self, identifier: Option<&str>) -> LapisResult<DigitalObjectArray> {
        DigitalObjectArray::create(self.create_object(identifier)?)
    }

    pub fn create_linked_list(
        &self,
        identifier: Option<&str>,
    ) -> LapisResult<DigitalObjectLinkedList> {
        DigitalObjectLinkedList::create(self.create_object(identifier)?)
    }

    /// Resolve `identifier`, following aliases. `Ok(None)` if it does not
    /// exist.
    pub fn lookup(&self, identifier: &str) -> LapisResult<Option<Entity>> {
        let pid = self.prepare_identifier(identifier)?;
        self.resolver.lookup(&pid)
    }

    /// Delete the record of `identifier` itself. Aliases are not followed
    /// and references to it are left dangling.
    pub fn delete(&self, identifier: &str) -> LapisResult<()> {
        let pid = self.prepare_identifier(identifier)?;
        self.store().delete(&pid)?;
        debug!(%pid, "deleted object");
        Ok(())
    }

    /// Create `alias` pointing at `target`, which may itself be an alias.
    pub fn create_alias(&self, target: &str, alias: &str) -> LapisResult<Pid> {
        let target = self.prepare_identifier(target)?;
        if !self.store().exists(&target)? {
            return Err(LapisError::NotFound(target));
        }
        let alias = self.prepare_identifier(alias)?;
        let alias = self.store().acquire(&alias)?;
        self.store().write(
            &alias,
            INDEX_RESOURCE_LOCATION,
            RecordValue::new(tags::HS_ALIAS, target.as_str()),
        )?;
        debug!(%alias, %target, "created alias");
        Ok(alias)
    }

    /// Delete the alias record `alias`. Returns `false` if the identifier
    /// exists but is not an alias.
    pub fn delete_alias(&self, alias: &str) -> LapisResult<bool> {
        let pid = self.prepare_identifier(alias)?;
        if !self.resolver.is_alias(&pid)? {
            return Ok(false);
        }
        self.store().delete(&pid)?;
        Ok(true)
    }

    pub fn is_alias(&self, identifier: &str) -> LapisResult<bool> {
        let pid = self.prepare_identifier(identifier)?;
        self.resolver.is_alias(&pid)
    }

    /// Strip characters that are unsafe in identifier suffixes.
    pub fn clean_identifier_string(s: &str) -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric() || "_-+.,;#~!$()[]{}".contains(*c))
            .collect()
    }
}

impl std::fmt::Debug for Infrastructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Infrastructure")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use lapis_store::FileRecordStore;
    use proptest::prelude::*;

    use crate::segment::Segment;

    fn pid(s: &str) -> Pid {
        Pid::parse(s).unwrap()
    }

    fn infra() -> Infrastructure {
        Infrastructure::in_memory(InfraConfig {
            random_seed: Some(42),
            ..InfraConfig::with_prefix("10876")
        })
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    #[test]
    fn lookup_returns_created_object() {
        let infra = infra();
        let obj = infra.create_object(Some("10876/abc")).unwrap();
        let found = infra.lookup("10876/abc").unwrap().unwrap();
        assert_eq!(found.pid(), obj.pid());
        assert_eq!(found.kind(), CollectionKind::Plain);
        assert!(found.object().alias_identifiers().is_empty());
    }

    #[test]
    fn caller_chosen_collision_is_surfaced() {
        let infra = infra();
        infra.create_object(Some("10876/dup")).unwrap();
        assert!(matches!(
            infra.create_object(Some("10876/dup")),
            Err(LapisError::AlreadyExists(p)) if p == pid("10876/dup")
        ));
    }

    #[test]
    fn invalid_identifier_is_rejected() {
        let infra = infra();
        assert!(matches!(
            infra.create_object(Some("no-prefix")),
            Err(LapisError::InvalidIdentifier(_))
        ));
        assert!(matches!(infra.lookup("x/y"), Err(LapisError::InvalidIdentifier(_))));
    }

    #[test]
    fn random_identifiers_have_expected_shape() {
        let infra = infra();
        let obj = infra.create_object(None).unwrap();
        assert_eq!(obj.pid().prefix(), "10876");
        let blocks: Vec<&str> = obj.pid().suffix().split('-').collect();
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|b| b.len() == 4));
    }

    #[test]
    fn random_collisions_are_retried() {
        let infra = infra();
        let first = Pid::random("10876", &mut StdRng::seed_from_u64(42)).unwrap();
        infra.store().acquire(&first).unwrap();

        let obj = infra.create_object(None).unwrap();
        assert_ne!(obj.pid(), &first);
    }

    #[test]
    fn exhausted_attempts_fail() {
        let config = InfraConfig {
            random_seed: Some(9),
            max_create_attempts: 1,
            ..InfraConfig::with_prefix("10876")
        };
        let infra = Infrastructure::in_memory(config).unwrap();
        let first = Pid::random("10876", &mut StdRng::seed_from_u64(9)).unwrap();
        infra.store().acquire(&first).unwrap();
        assert!(matches!(
            infra.create_object(None),
            Err(LapisError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn random_creation_requires_prefix() {
        let infra = Infrastructure::in_memory(InfraConfig::default()).unwrap();
        assert!(matches!(infra.create_object(None), Err(LapisError::Config(_))));
    }

    #[test]
    fn infix_is_applied_once() {
        let config = InfraConfig {
            identifier_infix: Some("test-".into()),
            ..InfraConfig::with_prefix("10876")
        };
        let infra = Infrastructure::in_memory(config).unwrap();
        let obj = infra.create_object(Some("10876/x")).unwrap();
        assert_eq!(obj.pid(), &pid("10876/test-x"));
        assert!(infra.lookup("10876/x").unwrap().is_some());
        assert!(infra.lookup("10876/test-x").unwrap().is_some());
    }

    #[test]
    fn created_kinds_are_dispatched_on_lookup() {
        let infra = infra();
        for (name, kind) in [
            ("10876/s", CollectionKind::Set),
            ("10876/a", CollectionKind::Array),
            ("10876/l", CollectionKind::LinkedList),
            ("10876/p", CollectionKind::Plain),
        ] {
            infra.create(Some(name), kind).unwrap();
            assert_eq!(infra.lookup(name).unwrap().unwrap().kind(), kind);
        }
    }

    #[test]
    fn domain_resource_type_stays_plain() {
        let infra = infra();
        let obj = infra.create_object(Some("10876/data")).unwrap();
        obj.set_resource_type("netcdf").unwrap();
        let found = infra.lookup("10876/data").unwrap().unwrap();
        assert_eq!(found.kind(), CollectionKind::Plain);
    }

    // -----------------------------------------------------------------------
    // Deletion and aliases
    // -----------------------------------------------------------------------

    #[test]
    fn delete_is_final() {
        let infra = infra();
        infra.create_object(Some("10876/gone")).unwrap();
        infra.delete("10876/gone").unwrap();
        assert!(infra.lookup("10876/gone").unwrap().is_none());
        assert!(matches!(infra.delete("10876/gone"), Err(LapisError::NotFound(_))));
    }

    #[test]
    fn alias_resolves_to_target() {
        let infra = infra();
        let set = infra.create_set(Some("10876/orig")).unwrap();
        infra.create_alias("10876/orig", "10876/alias").unwrap();

        let via_alias = infra.lookup("10876/alias").unwrap().unwrap();
        assert_eq!(via_alias.pid(), set.pid());
        assert_eq!(via_alias.kind(), CollectionKind::Set);
        assert_eq!(via_alias.object().alias_identifiers(), &[pid("10876/alias")]);
        assert!(infra.is_alias("10876/alias").unwrap());
        assert!(!infra.is_alias("10876/orig").unwrap());
    }

    #[test]
    fn alias_chain_is_reported() {
        let infra = infra();
        infra.create_object(Some("10876/orig")).unwrap();
        infra.create_alias("10876/orig", "10876/alias1").unwrap();
        infra.create_alias("10876/alias1", "10876/alias2").unwrap();
        let found = infra.lookup("10876/alias2").unwrap().unwrap();
        assert_eq!(
            found.object().alias_identifiers(),
            &[pid("10876/alias2"), pid("10876/alias1")]
        );
    }

    #[test]
    fn deleting_target_breaks_alias() {
        let infra = infra();
        infra.create_object(Some("10876/orig")).unwrap();
        infra.create_alias("10876/orig", "10876/alias").unwrap();
        infra.delete("10876/orig").unwrap();
        assert!(matches!(
            infra.lookup("10876/alias"),
            Err(LapisError::BrokenAlias { .. })
        ));
    }

    #[test]
    fn alias_requires_existing_target() {
        let infra = infra();
        assert!(matches!(
            infra.create_alias("10876/none", "10876/alias"),
            Err(LapisError::NotFound(_))
        ));
        assert!(infra.lookup("10876/alias").unwrap().is_none());
    }

    #[test]
    fn delete_alias_only_deletes_aliases() {
        let infra = infra();
        infra.create_object(Some("10876/orig")).unwrap();
        infra.create_alias("10876/orig", "10876/alias").unwrap();

        assert!(!infra.delete_alias("10876/orig").unwrap());
        assert!(infra.delete_alias("10876/alias").unwrap());
        assert!(infra.lookup("10876/alias").unwrap().is_none());
        assert!(infra.lookup("10876/orig").unwrap().is_some());
        assert!(matches!(
            infra.delete_alias("10876/alias"),
            Err(LapisError::NotFound(_))
        ));
    }

    #[test]
    fn clean_identifier_string_keeps_safe_characters() {
        assert_eq!(
            Infrastructure::clean_identifier_string("a b/c?d_e-(1)[2]{3}"),
            "abcd_e-(1)[2]{3}"
        );
        assert_eq!(Infrastructure::clean_identifier_string("äöü"), "");
    }

    // -----------------------------------------------------------------------
    // End to end
    // -----------------------------------------------------------------------

    #[test]
    fn set_membership_scenario() {
        let infra = infra();
        let root = infra.create_set(Some("10876/root")).unwrap();
        let members: Vec<DigitalObject> =
            (0..3).map(|_| infra.create_object(None).unwrap()).collect();
        for m in &members {
            assert!(root.add(m).unwrap());
        }

        assert_eq!(root.len().unwrap(), 3);
        for m in &members {
            assert_eq!(
                m.parent_identifiers(Segment::HASHMAP).unwrap(),
                BTreeSet::from([pid("10876/root")])
            );
        }

        assert!(root.remove(members[0].pid()).unwrap());
        assert_eq!(root.len().unwrap(), 2);
        assert!(members[0].parent_identifiers(Segment::HASHMAP).unwrap().is_empty());

        let found = infra.lookup("10876/root").unwrap().unwrap();
        let set = found.as_set().unwrap();
        let mut ids = set.member_identifiers().unwrap();
        ids.sort();
        let mut expected = vec![members[1].pid().clone(), members[2].pid().clone()];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn collections_persist_in_file_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Arc::new(FileRecordStore::open(dir.path()).unwrap());
            let infra = Infrastructure::new(store, InfraConfig::default()).unwrap();
            let list = infra.create_linked_list(Some("10876/list")).unwrap();
            let a = infra.create_object(Some("10876/a")).unwrap();
            let b = infra.create_object(Some("10876/b")).unwrap();
            list.append(&a).unwrap();
            list.append(&b).unwrap();
        }
        let store = Arc::new(FileRecordStore::open(dir.path()).unwrap());
        let infra = Infrastructure::new(store, InfraConfig::default()).unwrap();
        let found = infra.lookup("10876/list").unwrap().unwrap();
        let list = found.as_linked_list().unwrap();
        assert_eq!(list.identifiers().unwrap(), vec![pid("10876/a"), pid("10876/b")]);
    }

    proptest! {
        #[test]
        fn created_identifiers_roundtrip(suffix in "[a-zA-Z0-9_./ -]{1,24}") {
            let infra = infra();
            let raw = format!("10876/{suffix}");
            let obj = infra.create_object(Some(&raw)).unwrap();
            let found = infra.lookup(&raw).unwrap().unwrap();
            prop_assert_eq!(found.pid(), obj.pid());
            prop_assert_eq!(obj.pid().as_str(), raw.as_str());
        }
    }
}
