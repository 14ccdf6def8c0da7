use std::fmt;

/// Lifecycle hooks a policy script may define as top-level functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hook {
    Init,
    Mutate,
    Validate,
    Created,
    Updated,
    Deleted,
}

impl Hook {
    pub const ALL: [Hook; 6] = [
        Hook::Init,
        Hook::Mutate,
        Hook::Validate,
        Hook::Created,
        Hook::Updated,
        Hook::Deleted,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Hook::Init => "init",
            Hook::Mutate => "mutate",
            Hook::Validate => "validate",
            Hook::Created => "created",
            Hook::Updated => "updated",
            Hook::Deleted => "deleted",
        }
    }

    /// Logical parameters this hook can receive.
    pub fn accepts(self) -> &'static [Param] {
        match self {
            Hook::Init => &[Param::State, Param::Sync],
            Hook::Mutate | Hook::Validate => &[Param::State, Param::Sync, Param::Obj, Param::Op],
            Hook::Created | Hook::Deleted => &[Param::State, Param::Sync, Param::Obj],
            Hook::Updated => &[Param::State, Param::Sync, Param::Obj, Param::Old],
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical hook parameter, bound by declared name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// The policy state, persisted across calls.
    State,
    /// Marker requesting exclusive execution; receives `true` when held.
    Sync,
    Obj,
    Op,
    Old,
}

impl Param {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "state" => Some(Param::State),
            "sync" => Some(Param::Sync),
            "obj" => Some(Param::Obj),
            "op" => Some(Param::Op),
            "old" => Some(Param::Old),
            _ => None,
        }
    }
}

/// Positional binding of a hook's declared parameters.
///
/// `None` slots (unknown names, destructuring patterns, parameters the
/// hook cannot receive) are passed `undefined`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookSignature {
    pub params: Vec<Option<Param>>,
}

impl HookSignature {
    pub fn bind(hook: Hook, names: &[String]) -> Self {
        let accepted = hook.accepts();
        let mut seen = Vec::new();
        let params = names
            .iter()
            .map(|n| {
                let p = Param::from_name(n).filter(|p| accepted.contains(p))?;
                // First declaration of a name wins.
                if seen.contains(&p) {
                    return None;
                }
                seen.push(p);
                Some(p)
            })
            .collect();
        Self { params }
    }

    pub fn declares(&self, param: Param) -> bool {
        self.params.contains(&Some(param))
    }

    pub fn position(&self, param: Param) -> Option<usize> {
        self.params.iter().position(|p| *p == Some(param))
    }
}
