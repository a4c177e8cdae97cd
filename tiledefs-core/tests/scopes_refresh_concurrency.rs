//! Scoped overrides, source refresh, failing sources and shared use across threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tiledefs_core::{
    Attribute, Definition, DefinitionCache, DefinitionManager, DefinitionMap, DefinitionSource,
    DefinitionStore, DefsError, InMemorySource, Locale, Result, Scope,
};

fn shared_cache() -> (Arc<DefinitionCache>, Arc<InMemorySource<Locale>>) {
    let source = Arc::new(InMemorySource::new("shared"));
    source.set(
        Locale::root(),
        vec![
            Definition::new("layout").with_template("/layout.jsp"),
            Definition::new("x").with_template("/static-x.jsp"),
            Definition::new("WILDCARD:news/*")
                .extending("layout")
                .with_attribute("body", Attribute::template("/news/{1}.jsp")),
        ],
    );
    let cache = DefinitionCache::new(DefinitionStore::<Locale>::default().with_source(source.clone()));
    (Arc::new(cache), source)
}

#[test]
fn scoped_override_is_invisible_to_other_scopes() {
    let (cache, _) = shared_cache();
    let manager = DefinitionManager::new(cache.clone());
    let s1 = Scope::new(Locale::root());
    let s2 = Scope::new(Locale::root());

    manager
        .add_definition(Definition::new("x").with_template("/override-x.jsp"), &s1)
        .unwrap();
    manager
        .add_definition(Definition::new("only-in-s1").with_template("/s1.jsp"), &s1)
        .unwrap();

    assert_eq!(
        manager.get_definition("x", &s1).unwrap().unwrap().template_path(),
        Some("/override-x.jsp")
    );
    assert_eq!(
        manager.get_definition("x", &s2).unwrap().unwrap().template_path(),
        Some("/static-x.jsp")
    );
    assert!(manager.get_definition("only-in-s1", &s2).unwrap().is_none());

    // Shared cache untouched
    assert_eq!(
        cache.lookup("x", &Locale::root()).unwrap().unwrap().template_path(),
        Some("/static-x.jsp")
    );
    assert!(cache.lookup("only-in-s1", &Locale::root()).unwrap().is_none());
    assert_ne!(s1.id(), s2.id());
}

#[test]
fn scoped_definition_can_extend_synthesized_shared_definition() {
    let (cache, _) = shared_cache();
    let manager = DefinitionManager::new(cache);
    let scope = Scope::new("en_GB".parse::<Locale>().unwrap());

    let name = manager
        .add_definition(
            Definition::anonymous()
                .extending("news/weather")
                .with_attribute("banner", Attribute::text("Storm warning")),
            &scope,
        )
        .unwrap();

    let registered = manager.get_definition(&name, &scope).unwrap().unwrap();
    assert_eq!(registered.template_path(), Some("/layout.jsp"));
    assert_eq!(
        registered.attribute("body").and_then(Attribute::as_text),
        Some("/news/weather.jsp")
    );
}

#[test]
fn refresh_picks_up_changed_sources() {
    let (cache, source) = shared_cache();
    cache.set_refresh_enabled(true);

    let before = cache.get("x", &Locale::root()).unwrap();
    assert_eq!(before.template_path(), Some("/static-x.jsp"));

    source.insert(Locale::root(), Definition::new("x").with_template("/changed-x.jsp"));
    assert!(cache.refresh().unwrap());

    let after = cache.get("x", &Locale::root()).unwrap();
    assert_eq!(after.template_path(), Some("/changed-x.jsp"));

    // Nothing changed since: no invalidation
    assert!(!cache.refresh().unwrap());
    assert!(Arc::ptr_eq(&after, &cache.get("x", &Locale::root()).unwrap()));
}

#[test]
fn refresh_enabled_rechecks_on_lookup() {
    let (cache, source) = shared_cache();
    cache.set_refresh_enabled(true);
    assert!(cache.refresh_enabled());

    cache.get("x", &"en".parse().unwrap()).unwrap();
    source.insert(Locale::root(), Definition::new("x").with_template("/changed-x.jsp"));

    let after = cache.get("x", &"en".parse().unwrap()).unwrap();
    assert_eq!(after.template_path(), Some("/changed-x.jsp"));
}

#[test]
fn stale_entries_survive_without_refresh() {
    let (cache, source) = shared_cache();

    cache.get("x", &Locale::root()).unwrap();
    source.insert(Locale::root(), Definition::new("x").with_template("/changed-x.jsp"));

    assert_eq!(
        cache.get("x", &Locale::root()).unwrap().template_path(),
        Some("/static-x.jsp")
    );
}

/// Source whose loads fail on demand
struct FlakySource {
    failing: AtomicBool,
}

impl DefinitionSource<Locale> for FlakySource {
    fn id(&self) -> &str {
        "flaky"
    }

    fn load(&self, _key: &Locale) -> Result<DefinitionMap> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DefsError::SourceLoad {
                source_id: "flaky".to_string(),
                reason: "backend unavailable".to_string(),
            });
        }
        let mut definitions = DefinitionMap::new();
        definitions.insert("ok".to_string(), Definition::new("ok"));
        Ok(definitions)
    }

    fn has_changed(&self) -> bool {
        false
    }
}

#[test]
fn source_errors_propagate_unchanged() {
    let flaky = Arc::new(FlakySource {
        failing: AtomicBool::new(true),
    });
    let cache = DefinitionCache::new(DefinitionStore::<Locale>::default().with_source(flaky.clone()));

    match cache.lookup("ok", &Locale::root()).unwrap_err() {
        DefsError::SourceLoad { source_id, reason } => {
            assert_eq!(source_id, "flaky");
            assert_eq!(reason, "backend unavailable");
        }
        other => panic!("expected SourceLoad, got {other:?}"),
    }

    // Failed loads are not remembered
    flaky.failing.store(false, Ordering::SeqCst);
    assert!(cache.lookup("ok", &Locale::root()).unwrap().is_some());
}

#[test]
fn concurrent_lookups_share_one_resolved_definition() {
    let (cache, _) = shared_cache();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.get("news/sports", &"en_US".parse().unwrap()).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
    assert_eq!(cache.stats().synthesized, 1);
}

#[test]
fn concurrent_lookups_across_keys() {
    let (cache, _) = shared_cache();
    let locales = ["en", "en_US", "fr", "fr_CA", "de", "de_AT", "ja", ""];

    let handles: Vec<_> = locales
        .iter()
        .map(|tag| {
            let cache = cache.clone();
            let key: Locale = tag.parse().unwrap();
            thread::spawn(move || {
                let layout = cache.get("layout", &key).unwrap();
                let news = cache.get("news/tech", &key).unwrap();
                (layout.template_path().map(String::from), news.template_path().map(String::from))
            })
        })
        .collect();

    for handle in handles {
        let (layout, news) = handle.join().unwrap();
        assert_eq!(layout.as_deref(), Some("/layout.jsp"));
        assert_eq!(news.as_deref(), Some("/layout.jsp"));
    }
    assert_eq!(cache.stats().keys, locales.len());
}

#[test]
fn scopes_on_separate_threads_do_not_interfere() {
    let (cache, _) = shared_cache();
    let manager = DefinitionManager::new(cache);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let manager = manager.clone();
            thread::spawn(move || {
                let scope = Scope::new(Locale::root());
                let template = format!("/thread-{}.jsp", i);
                manager
                    .add_definition(Definition::new("x").with_template(template.clone()), &scope)
                    .unwrap();
                let name = manager.add_definition(Definition::anonymous(), &scope).unwrap();
                let found = manager.get_definition("x", &scope).unwrap().unwrap();
                (found.template_path() == Some(template.as_str()), name)
            })
        })
        .collect();

    for handle in handles {
        let (own_override_seen, anonymous) = handle.join().unwrap();
        assert!(own_override_seen);
        assert_eq!(anonymous, "$anonymous1");
    }
    assert_eq!(
        manager.get_definition("x", &Scope::new(Locale::root())).unwrap().unwrap().template_path(),
        Some("/static-x.jsp")
    );
}

#[test]
fn loading_another_key_does_not_hide_a_pending_change() {
    let (cache, source) = shared_cache();
    cache.get("x", &Locale::root()).unwrap();

    source.insert(Locale::root(), Definition::new("x").with_template("/changed-x.jsp"));
    cache.get("layout", &"de".parse().unwrap()).unwrap();

    assert!(cache.refresh().unwrap());
    assert_eq!(
        cache.get("x", &Locale::root()).unwrap().template_path(),
        Some("/changed-x.jsp")
    );
}

#[test]
fn synthesized_lookups_survive_concurrent_refresh_and_reset() {
    let (cache, source) = shared_cache();
    let readers = 4;
    let rounds = 2000;
    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(readers + 1));

    let writer = {
        let cache = cache.clone();
        let source = source.clone();
        let done = done.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            let mut round = 0u64;
            while !done.load(Ordering::SeqCst) {
                source.insert(
                    Locale::root(),
                    Definition::new("x").with_template(format!("/x-{}.jsp", round)),
                );
                cache.refresh().unwrap();
                if round % 3 == 0 {
                    cache.reset();
                }
                round += 1;
            }
        })
    };

    let handles: Vec<_> = (0..readers)
        .map(|reader| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut missing = Vec::new();
                for i in 0..rounds {
                    let name = format!("news/r{}-{}", reader, i);
                    match cache.lookup(&name, &Locale::root()) {
                        Ok(Some(found)) => assert_eq!(found.template_path(), Some("/layout.jsp")),
                        Ok(None) => missing.push(name),
                        Err(e) => panic!("lookup of {name} failed: {e}"),
                    }
                }
                missing
            })
        })
        .collect();

    let missing: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    done.store(true, Ordering::SeqCst);
    writer.join().unwrap();

    assert!(missing.is_empty(), "unresolved: {:?}", &missing[..missing.len().min(5)]);
}
