//! HAL type-link resolution.
//!
//! Type links look like `http://example.com/rest/type/<entity_type>/<bundle>`.
//! [`HalLinkTypes`] only answers for entity types present in its registry;
//! everything else is left to the caller's fallback.

use std::cell::RefCell;
use std::collections::HashMap;

use courier_core::{EntityTypeId, EntityTypeRegistry, LinkTypes};

const TYPE_PATH: &str = "/rest/type/";

/// `(entity_type, bundle)` encoded in a `/rest/type/` link.
pub fn parse_type_href(href: &str) -> Option<(EntityTypeId, String)> {
    let (_, rest) = href.split_once(TYPE_PATH)?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let mut segments = rest.trim_end_matches('/').split('/');
    let entity_type = segments.next().filter(|s| !s.is_empty())?;
    let bundle = segments.next().unwrap_or(entity_type);
    Some((EntityTypeId::from(entity_type), bundle.to_string()))
}

/// `<domain>/rest/type/<entity_type>/<bundle>`
pub fn type_href(domain: &str, entity_type: &EntityTypeId, bundle: Option<&str>) -> String {
    let bundle = bundle.unwrap_or(entity_type.as_str());
    format!("{domain}{TYPE_PATH}{entity_type}/{bundle}")
}

#[derive(Debug)]
pub struct HalLinkTypes {
    registry: EntityTypeRegistry,
    cache: RefCell<HashMap<String, Option<EntityTypeId>>>,
}

impl HalLinkTypes {
    pub fn new(registry: EntityTypeRegistry) -> Self {
        Self {
            registry,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Number of cached lookups.
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl LinkTypes for HalLinkTypes {
    fn resolve_type_from_url(&self, url: &str) -> Option<EntityTypeId> {
        if let Some(hit) = self.cache.borrow().get(url) {
            return hit.clone();
        }
        let resolved = parse_type_href(url)
            .map(|(entity_type, _)| entity_type)
            .filter(|entity_type| self.registry.contains(entity_type));
        self.cache
            .borrow_mut()
            .insert(url.to_string(), resolved.clone());
        resolved
    }

    fn invalidate(&self) {
        self.cache.borrow_mut().clear();
    }
}
