//! Page graph
//!
//! Every page's static properties and transitions live in one table, looked up
//! by [`Page::spec`]. Code that needs per-page behaviour reads the table rather
//! than matching on the page again.

/// One navigable screen of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Jobs,
    AllTasks,
    JobTasks,
    JobSpec,
    JobMeta,
    JobEvents,
    JobEvent,
    AllocEvents,
    AllocEvent,
    AllEvents,
    AllEvent,
    AllocSpec,
    Logs,
    Logline,
    Stats,
    Exec,
}

/// Whether task pages were reached from the jobs list or the all-tasks list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowseMode {
    #[default]
    Jobs,
    AllTasks,
}

impl BrowseMode {
    #[must_use]
    pub fn task_listing(self) -> Page {
        match self {
            BrowseMode::Jobs => Page::JobTasks,
            BrowseMode::AllTasks => Page::AllTasks,
        }
    }

    #[must_use]
    pub fn first_page(self) -> Page {
        match self {
            BrowseMode::Jobs => Page::Jobs,
            BrowseMode::AllTasks => Page::AllTasks,
        }
    }
}

/// Where the back key leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backward {
    To(Page),
    /// The task listing the session is browsing (JobTasks or AllTasks)
    TaskListing,
}

/// Navigation context a page keeps when it becomes current
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextScope {
    pub job: bool,
    pub task: bool,
    pub event: bool,
    pub log_line: bool,
}

impl ContextScope {
    const NONE: Self = Self {
        job: false,
        task: false,
        event: false,
        log_line: false,
    };
    const JOB: Self = Self {
        job: true,
        ..Self::NONE
    };
    const TASK: Self = Self {
        job: true,
        task: true,
        ..Self::NONE
    };
}

/// Static properties of a page
#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    pub page: Page,
    pub can_be_first: bool,
    /// Issues a fetch when it becomes current
    pub does_load: bool,
    pub shows_tasks: bool,
    /// Re-fetched periodically by the poll scheduler
    pub does_reload: bool,
    /// Destination when a row is selected
    pub forward: Option<Page>,
    pub backward: Backward,
    pub scope: ContextScope,
}

const fn spec(page: Page, forward: Option<Page>, backward: Backward, scope: ContextScope) -> PageSpec {
    PageSpec {
        page,
        can_be_first: false,
        does_load: true,
        shows_tasks: false,
        does_reload: true,
        forward,
        backward,
        scope,
    }
}

/// Single-event and log-line pages render the selected payload locally
const fn detail(page: Page, back: Page, scope: ContextScope) -> PageSpec {
    PageSpec {
        does_load: false,
        does_reload: false,
        ..spec(page, None, Backward::To(back), scope)
    }
}

const fn stream(page: Page, forward: Page, backward: Backward, scope: ContextScope) -> PageSpec {
    PageSpec {
        does_reload: false,
        ..spec(page, Some(forward), backward, scope)
    }
}

const TASK_SCOPE: ContextScope = ContextScope::TASK;

/// Indexed by `Page as usize`
static PAGE_TABLE: [PageSpec; 16] = [
    PageSpec {
        can_be_first: true,
        ..spec(Page::Jobs, Some(Page::JobTasks), Backward::To(Page::Jobs), ContextScope::NONE)
    },
    PageSpec {
        can_be_first: true,
        shows_tasks: true,
        ..spec(Page::AllTasks, Some(Page::Logs), Backward::To(Page::AllTasks), ContextScope::NONE)
    },
    PageSpec {
        shows_tasks: true,
        ..spec(Page::JobTasks, Some(Page::Logs), Backward::To(Page::Jobs), ContextScope::JOB)
    },
    spec(Page::JobSpec, None, Backward::To(Page::Jobs), ContextScope::JOB),
    spec(Page::JobMeta, None, Backward::To(Page::Jobs), ContextScope::JOB),
    stream(Page::JobEvents, Page::JobEvent, Backward::To(Page::Jobs), ContextScope::JOB),
    detail(
        Page::JobEvent,
        Page::JobEvents,
        ContextScope {
            event: true,
            ..ContextScope::JOB
        },
    ),
    stream(Page::AllocEvents, Page::AllocEvent, Backward::TaskListing, TASK_SCOPE),
    detail(
        Page::AllocEvent,
        Page::AllocEvents,
        ContextScope {
            event: true,
            ..TASK_SCOPE
        },
    ),
    stream(Page::AllEvents, Page::AllEvent, Backward::To(Page::Jobs), ContextScope::NONE),
    detail(
        Page::AllEvent,
        Page::AllEvents,
        ContextScope {
            event: true,
            ..ContextScope::NONE
        },
    ),
    spec(Page::AllocSpec, None, Backward::TaskListing, TASK_SCOPE),
    spec(Page::Logs, Some(Page::Logline), Backward::TaskListing, TASK_SCOPE),
    detail(
        Page::Logline,
        Page::Logs,
        ContextScope {
            log_line: true,
            ..TASK_SCOPE
        },
    ),
    spec(Page::Stats, None, Backward::TaskListing, TASK_SCOPE),
    PageSpec {
        does_reload: false,
        ..spec(Page::Exec, None, Backward::TaskListing, TASK_SCOPE)
    },
];

impl Page {
    pub const ALL: [Page; 16] = [
        Page::Jobs,
        Page::AllTasks,
        Page::JobTasks,
        Page::JobSpec,
        Page::JobMeta,
        Page::JobEvents,
        Page::JobEvent,
        Page::AllocEvents,
        Page::AllocEvent,
        Page::AllEvents,
        Page::AllEvent,
        Page::AllocSpec,
        Page::Logs,
        Page::Logline,
        Page::Stats,
        Page::Exec,
    ];

    #[must_use]
    pub fn spec(self) -> &'static PageSpec {
        &PAGE_TABLE[self as usize]
    }

    /// Target of selecting a row, if the page has one
    #[must_use]
    pub fn forward(self) -> Option<Page> {
        self.spec().forward
    }

    #[must_use]
    pub fn backward(self, mode: BrowseMode) -> Page {
        match self.spec().backward {
            Backward::To(page) => page,
            Backward::TaskListing => mode.task_listing(),
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Page::Jobs => "Jobs",
            Page::AllTasks => "All Tasks",
            Page::JobTasks => "Tasks",
            Page::JobSpec => "Job Spec",
            Page::JobMeta => "Job Meta",
            Page::JobEvents => "Job Events",
            Page::JobEvent => "Job Event",
            Page::AllocEvents => "Allocation Events",
            Page::AllocEvent => "Allocation Event",
            Page::AllEvents => "All Events",
            Page::AllEvent => "Event",
            Page::AllocSpec => "Allocation Spec",
            Page::Logs => "Logs",
            Page::Logline => "Log Line",
            Page::Stats => "Stats",
            Page::Exec => "Exec",
        }
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}
