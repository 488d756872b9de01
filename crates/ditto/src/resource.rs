use std::fmt;

/// Error returned when a resource limit is exceeded during a clone operation.
///
/// This lets hosts enforce strict limits on how much a single snapshot is
/// allowed to allocate, hold, or recurse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum number of heap allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum heap memory usage exceeded.
    Memory { limit: usize, used: usize },
    /// Maximum clone recursion depth exceeded.
    Depth { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
            Self::Depth { limit, depth } => {
                write!(f, "clone depth limit exceeded: {depth} > {limit}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Trait for tracking resource usage of a heap.
///
/// Implementations can enforce limits on allocation count, memory, and clone
/// recursion depth. The heap is generic over the tracker, so with
/// [`NoLimitTracker`] every check compiles away to a no-op.
pub trait ResourceTracker: fmt::Debug {
    /// Called before each heap allocation.
    ///
    /// Returns `Ok(())` if the allocation should proceed, or
    /// `Err(ResourceError)` if a limit would be exceeded. `get_size` is only
    /// invoked when the tracker actually accounts for memory.
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError>;

    /// Called on each step deeper into the reference graph during a clone.
    ///
    /// `depth` is the depth after the step. The default tracker imposes no
    /// limit: recursion is bounded only by the longest reference chain in
    /// the source graph, and pathologically deep acyclic graphs can exhaust
    /// the call stack. Hosts that need protection configure
    /// [`ResourceLimits::max_clone_depth`].
    fn check_clone_depth(&self, depth: usize) -> Result<(), ResourceError>;

    /// Returns the total number of allocations tracked, if recorded.
    fn allocation_count(&self) -> Option<usize> {
        None
    }

    /// Returns the current approximate memory usage in bytes, if tracked.
    fn current_memory_bytes(&self) -> Option<usize> {
        None
    }
}

/// A tracker that imposes no limits and records nothing.
///
/// All checks are no-ops and compile away entirely. This is the default for
/// hosts that trust their object graphs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_allocate(&mut self, _get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn check_clone_depth(&self, _depth: usize) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Configuration for resource limits.
///
/// All limits are optional. Use `ResourceLimits::new()` for no limits and
/// the builder methods to opt in.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of heap allocations allowed.
    pub max_allocations: Option<usize>,
    /// Maximum heap memory in bytes (approximate).
    pub max_memory: Option<usize>,
    /// Maximum clone recursion depth.
    pub max_clone_depth: Option<usize>,
}

impl ResourceLimits {
    /// Creates limits with every check disabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_allocations: None,
            max_memory: None,
            max_clone_depth: None,
        }
    }

    /// Sets the maximum number of allocations.
    #[must_use]
    pub const fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    /// Sets the maximum memory usage in bytes.
    #[must_use]
    pub const fn max_memory(mut self, limit: usize) -> Self {
        self.max_memory = Some(limit);
        self
    }

    /// Sets the maximum clone recursion depth.
    #[must_use]
    pub const fn max_clone_depth(mut self, limit: usize) -> Self {
        self.max_clone_depth = Some(limit);
        self
    }
}

/// A resource tracker that enforces configurable limits.
///
/// Tracks allocation count and approximate memory usage, returning errors
/// when limits are exceeded.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    /// Total number of allocations made.
    allocation_count: usize,
    /// Current approximate memory usage in bytes.
    current_memory: usize,
}

impl LimitedTracker {
    /// Creates a new tracker with the given limits.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            allocation_count: 0,
            current_memory: 0,
        }
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_allocations
            && self.allocation_count >= max
        {
            return Err(ResourceError::Allocation {
                limit: max,
                count: self.allocation_count + 1,
            });
        }

        if let Some(max) = self.limits.max_memory {
            let new_memory = self.current_memory + get_size();
            if new_memory > max {
                return Err(ResourceError::Memory {
                    limit: max,
                    used: new_memory,
                });
            }
            self.current_memory = new_memory;
        }

        self.allocation_count += 1;
        Ok(())
    }

    fn check_clone_depth(&self, depth: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_clone_depth
            && depth > max
        {
            return Err(ResourceError::Depth { limit: max, depth });
        }
        Ok(())
    }

    fn allocation_count(&self) -> Option<usize> {
        Some(self.allocation_count)
    }

    fn current_memory_bytes(&self) -> Option<usize> {
        Some(self.current_memory)
    }
}
