use anyhow::{Context, Result};

use crate::{
    config::RouteEntry,
    pattern::PathPattern,
};

#[derive(Debug, Clone)]
pub struct Upstream {
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: PathPattern,
    pub upstream: Upstream,
}

pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn from_entries(entries: &[RouteEntry]) -> Result<Self> {
        let mut routes = Vec::with_capacity(entries.len());
        for entry in entries {
            routes.push(Route {
                pattern: PathPattern::compile(&entry.pattern)
                    .with_context(|| format!("invalid route pattern {:?}", entry.pattern))?,
                upstream: Upstream {
                    uri: entry.upstream.trim_end_matches('/').to_string(),
                },
            });
        }
        Ok(Self { routes })
    }

    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let mut best: Option<&Route> = None;
        for route in &self.routes {
            if !route.pattern.matches(path) {
                continue;
            }
            best = match best {
                Some(current) if !route.pattern.is_more_specific_than(&current.pattern) => {
                    Some(current)
                }
                _ => Some(route),
            };
        }
        best
    }
}
