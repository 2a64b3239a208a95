use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Name of the route that hosts the login page.
pub const LOGIN_ROUTE: &str = "login";

/// Query parameter telling the login page where to return afterwards.
pub const WANTED_ROUTE: &str = "wantedRoute";

/// Full-page navigation, i.e. `window.location.assign`.
pub trait Navigator: Send + Sync {
    fn assign(&self, url: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: Option<String>,
    pub full_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLocation {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl Route {
    pub fn new(name: Option<&str>, full_path: impl Into<String>) -> Self {
        Route {
            name: name.map(str::to_owned),
            full_path: full_path.into(),
        }
    }

    pub fn is_login(&self) -> bool {
        self.name.as_deref() == Some(LOGIN_ROUTE)
    }
}

impl RouteLocation {
    pub fn login(wanted_route: &str) -> Self {
        let mut params = BTreeMap::new();
        params.insert(WANTED_ROUTE.to_owned(), wanted_route.to_owned());
        RouteLocation {
            name: LOGIN_ROUTE.to_owned(),
            params,
        }
    }
}

/// The single-page router.
pub trait Router: Send + Sync {
    fn current_route(&self) -> Route;

    fn replace(&self, location: RouteLocation);
}

/// Router that only remembers where it is. Replacing the route sets the full path to
/// `/<name>`.
#[derive(Debug)]
pub struct MemoryRouter {
    current: Mutex<Route>,
    history: Mutex<Vec<RouteLocation>>,
}

impl MemoryRouter {
    pub fn new(initial: Route) -> Self {
        MemoryRouter {
            current: Mutex::new(initial),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Every location passed to `replace`, oldest first.
    pub fn replacements(&self) -> Vec<RouteLocation> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Router for MemoryRouter {
    fn current_route(&self) -> Route {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, location: RouteLocation) {
        let route = Route::new(Some(&location.name), format!("/{}", location.name));
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = route;
        self.history.lock().unwrap_or_else(PoisonError::into_inner).push(location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_moves_router() {
        let router = MemoryRouter::new(Route::new(Some("chat"), "/chat?channel=1"));
        assert!(!router.current_route().is_login());

        router.replace(RouteLocation::login("/chat?channel=1"));

        assert!(router.current_route().is_login());
        let replaced = router.replacements();
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].params[WANTED_ROUTE], "/chat?channel=1");
    }
}
