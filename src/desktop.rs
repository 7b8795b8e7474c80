//! Desktop state
//!
//! The single context object of the shell. It reacts to compositor events,
//! owns every output and its surfaces, the unlock dialog and the grab
//! surface, and decides when the desktop is ready.

use crate::config::{Config, ShellConfig, ValidLauncher};
use crate::dispatch::{Task, TaskSender};
use crate::ipc::IpcSender;
use crate::output::Output;
use crate::shell::grab::{self, GrabSurface};
use crate::shell::render::Canvas;
use crate::shell::taskbar::{DEFAULT_TITLE, RAISED};
use crate::shell::unlock::UnlockDialog;
use crate::shell::{Edges, SurfaceRole};
use crate::toolkit::{SurfaceId, Toolkit};
use std::collections::{HashMap, VecDeque};
use tessera_ipc::{
    CursorShape, PointerEvent, ShellEvent, ShellRequest, TouchEvent, DESKTOP_SHELL_INTERFACE,
    DESKTOP_SHELL_VERSION, OUTPUT_INTERFACE, OUTPUT_VERSION,
};
use tracing::{debug, info, warn};

/// The bound shell global
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellGlobal {
    pub name: u32,
    /// Negotiated interface version
    pub version: u32,
}

/// Whether `DesktopReady` went out. Never goes back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Readiness {
    #[default]
    Pending,
    Ready,
}

/// A compositor-managed window as last reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedWindow {
    pub handle: u32,
    pub title: String,
    pub state: u32,
}

/// Which shell surface an input event or configure is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Panel(usize),
    Taskbar(usize),
    Background,
    Unlock,
    Grab,
}

pub struct Desktop {
    config: ShellConfig,
    launchers: Vec<ValidLauncher>,
    ipc: IpcSender,
    tasks: TaskSender,
    toolkit: Toolkit,

    /// Every advertised global, name to interface
    globals: HashMap<u32, String>,
    shell: Option<ShellGlobal>,
    outputs: Vec<Output>,
    readiness: Readiness,

    unlock_dialog: Option<UnlockDialog>,
    /// Tasks for the next loop iteration
    deferred: VecDeque<Task>,

    grab: Option<GrabSurface>,
    grab_cursor: CursorShape,

    windows: Vec<ManagedWindow>,
}

impl Desktop {
    pub fn new(config: &Config, ipc: IpcSender, tasks: TaskSender) -> Self {
        Self {
            config: config.shell.clone(),
            launchers: config.valid_launchers(),
            toolkit: Toolkit::new(ipc.clone()),
            ipc,
            tasks,
            globals: HashMap::new(),
            shell: None,
            outputs: Vec::new(),
            readiness: Readiness::default(),
            unlock_dialog: None,
            deferred: VecDeque::new(),
            grab: None,
            grab_cursor: CursorShape::default(),
            windows: Vec::new(),
        }
    }

    pub fn shell(&self) -> Option<ShellGlobal> {
        self.shell
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn unlock_dialog(&self) -> Option<&UnlockDialog> {
        self.unlock_dialog.as_ref()
    }

    pub fn grab_cursor(&self) -> CursorShape {
        self.grab_cursor
    }

    pub fn windows(&self) -> &[ManagedWindow] {
        &self.windows
    }

    pub fn handle_event(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::Global {
                name,
                interface,
                version,
            } => self.handle_global(name, interface, version),
            ShellEvent::GlobalRemove { name } => self.handle_global_remove(name),
            ShellEvent::OutputGeometry {
                output, transform, ..
            } => match self.outputs.iter_mut().find(|o| o.id() == output) {
                Some(out) => out.set_transform(&mut self.toolkit, transform),
                None => debug!("Geometry for unknown output {}", output),
            },
            ShellEvent::OutputScale { output, scale } => {
                match self.outputs.iter_mut().find(|o| o.id() == output) {
                    Some(out) => out.set_scale(&mut self.toolkit, scale),
                    None => debug!("Scale for unknown output {}", output),
                }
            }
            ShellEvent::Configure {
                edges,
                surface,
                width,
                height,
            } => self.configure(SurfaceId(surface), Edges::from_bits_truncate(edges), width, height),
            ShellEvent::PrepareLockSurface => self.prepare_lock_surface(),
            ShellEvent::GrabCursor { cursor } => {
                self.grab_cursor = grab::cursor_from_protocol(cursor);
                debug!("Grab cursor is now {:?}", self.grab_cursor);
            }
            ShellEvent::ManagedSurfaceAdded { handle } => self.managed_surface_added(handle),
            ShellEvent::ManagedSurfaceStateChanged { handle, state } => {
                self.managed_surface_state_changed(handle, state)
            }
            ShellEvent::ManagedSurfaceTitleChanged { handle, title } => {
                self.managed_surface_title_changed(handle, &title)
            }
            ShellEvent::ManagedSurfaceRemoved { handle } => self.managed_surface_removed(handle),
            ShellEvent::Pointer { surface, event } => self.pointer(SurfaceId(surface), event),
            ShellEvent::Touch { surface, event } => self.touch(SurfaceId(surface), event),
        }
    }

    // ========================================================================
    // Globals
    // ========================================================================

    fn handle_global(&mut self, name: u32, interface: String, version: u32) {
        debug!("Global {} {} v{}", name, interface, version);
        if interface == DESKTOP_SHELL_INTERFACE {
            self.bind_shell(name, version);
        } else if interface == OUTPUT_INTERFACE {
            self.create_output(name);
        }
        self.globals.insert(name, interface);
    }

    fn handle_global_remove(&mut self, name: u32) {
        match self.globals.remove(&name).as_deref() {
            Some(OUTPUT_INTERFACE) => self.destroy_output(name),
            Some(DESKTOP_SHELL_INTERFACE) => warn!("Shell global {} withdrawn, ignoring", name),
            Some(interface) => debug!("Global {} ({}) removed", name, interface),
            None => debug!("Unknown global {} removed", name),
        }
    }

    fn bind_shell(&mut self, name: u32, version: u32) {
        if let Some(shell) = self.shell {
            warn!("Ignoring second shell global {} (bound {})", name, shell.name);
            return;
        }

        let version = version.min(DESKTOP_SHELL_VERSION);
        self.ipc.send(ShellRequest::Bind {
            name,
            interface: DESKTOP_SHELL_INTERFACE.to_string(),
            version,
        });
        self.shell = Some(ShellGlobal { name, version });
        info!("Bound shell global {} at version {}", name, version);

        if self.grab.is_none() {
            self.grab = Some(GrabSurface::create(&mut self.toolkit));
        }

        // Outputs announced before the shell get their surfaces now
        for index in 0..self.outputs.len() {
            if !self.outputs[index].is_initialized() {
                self.init_output(index);
            }
        }
    }

    fn create_output(&mut self, name: u32) {
        self.ipc.send(ShellRequest::Bind {
            name,
            interface: OUTPUT_INTERFACE.to_string(),
            version: OUTPUT_VERSION,
        });
        self.outputs.push(Output::new(name));
        debug!("Output {} registered", name);

        if self.shell.is_some() {
            self.init_output(self.outputs.len() - 1);
        }
    }

    fn init_output(&mut self, index: usize) {
        let output = &mut self.outputs[index];
        output.init(&mut self.toolkit, &self.config, &self.launchers, &self.tasks);

        // Mirror windows that already exist
        if let Some(roles) = output.roles_mut() {
            for window in &self.windows {
                roles
                    .taskbar
                    .add_handler(&mut self.toolkit, window.handle, &window.title, window.state);
            }
        }
    }

    fn destroy_output(&mut self, name: u32) {
        let Some(index) = self.outputs.iter().position(|o| o.id() == name) else {
            debug!("Removal of unknown output {}", name);
            return;
        };
        let output = self.outputs.remove(index);
        output.destroy(&mut self.toolkit);
        info!("Output {} removed", name);

        // The remaining outputs may now all be painted
        if !self.outputs.is_empty() {
            self.check_desktop_ready();
        }
    }

    // ========================================================================
    // Surfaces
    // ========================================================================

    fn target(&self, surface: SurfaceId) -> Option<Target> {
        if self.grab.as_ref().is_some_and(|g| g.surface() == surface) {
            return Some(Target::Grab);
        }
        if self
            .unlock_dialog
            .as_ref()
            .is_some_and(|d| d.surface() == surface)
        {
            return Some(Target::Unlock);
        }
        for (index, output) in self.outputs.iter().enumerate() {
            let Some(roles) = output.roles() else {
                continue;
            };
            if roles.panel.surface() == surface {
                return Some(Target::Panel(index));
            }
            if roles.taskbar.surface() == surface {
                return Some(Target::Taskbar(index));
            }
            if roles.background.surface() == surface {
                return Some(Target::Background);
            }
        }
        None
    }

    fn configure(&mut self, surface: SurfaceId, edges: Edges, width: i32, height: i32) {
        match role_mut(&mut self.outputs, &mut self.unlock_dialog, &mut self.grab, surface) {
            Some(role) => role.configure(&mut self.toolkit, edges, width, height),
            None => warn!("Configure for unknown {}", surface),
        }
    }

    /// Lay out, paint and commit every surface with pending work
    pub fn redraw(&mut self) {
        let mut output_painted = false;

        for pending in self.toolkit.take_pending() {
            let Some(role) =
                role_mut(&mut self.outputs, &mut self.unlock_dialog, &mut self.grab, pending.surface)
            else {
                continue;
            };

            if let Some((width, height)) = pending.resize {
                role.resize(width, height);
            }

            let allocation = self.toolkit.allocation(pending.surface);
            if allocation.is_empty() {
                continue;
            }

            let mut canvas = Canvas::new(allocation.width as u32, allocation.height as u32);
            role.paint(&self.toolkit, &mut canvas);
            self.toolkit.commit(pending.surface, &canvas);

            if role.mark_painted() {
                debug!("{} painted for the first time", pending.surface);
                output_painted |= self.outputs.iter().any(|o| o.owns(pending.surface));
            }
        }

        if output_painted {
            self.check_desktop_ready();
        }
    }

    /// Every output has all three surfaces painted
    pub fn is_desktop_painted(&self) -> bool {
        self.outputs.iter().all(Output::is_painted)
    }

    fn check_desktop_ready(&mut self) {
        if self.readiness == Readiness::Ready || !self.is_desktop_painted() {
            return;
        }
        self.readiness = Readiness::Ready;

        match self.shell {
            Some(shell) if shell.version >= 2 => {
                self.ipc.send(ShellRequest::DesktopReady);
                info!("Desktop ready");
            }
            _ => info!("Desktop painted; shell too old for desktop_ready"),
        }
    }

    // ========================================================================
    // Lock
    // ========================================================================

    fn prepare_lock_surface(&mut self) {
        if !self.config.locking {
            debug!("Locking disabled, unlocking right away");
            self.ipc.send(ShellRequest::Unlock);
            return;
        }

        if self.unlock_dialog.is_none() {
            info!("Showing unlock dialog");
            self.unlock_dialog = Some(UnlockDialog::create(&mut self.toolkit));
        }
    }

    fn finish_unlock(&mut self) {
        self.ipc.send(ShellRequest::Unlock);
        if let Some(dialog) = self.unlock_dialog.take() {
            dialog.destroy(&mut self.toolkit);
        }
        info!("Desktop unlocked");
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Run `task` on the next loop iteration
    pub fn defer(&mut self, task: Task) {
        self.deferred.push_back(task);
    }

    /// Run the tasks deferred so far. Tasks they defer wait for the next
    /// iteration.
    pub fn run_deferred(&mut self) {
        let tasks = std::mem::take(&mut self.deferred);
        for task in tasks {
            self.run_task(task);
        }
    }

    pub fn run_task(&mut self, task: Task) {
        match task {
            Task::ClockTick { panel } => self.toolkit.schedule_redraw(panel),
            Task::FinishUnlock => self.finish_unlock(),
        }
    }

    // ========================================================================
    // Managed windows
    // ========================================================================

    fn managed_surface_added(&mut self, handle: u32) {
        if self.windows.iter().any(|w| w.handle == handle) {
            warn!("Managed window {} announced twice", handle);
            return;
        }
        self.windows.push(ManagedWindow {
            handle,
            title: DEFAULT_TITLE.to_string(),
            state: RAISED,
        });

        let Self { outputs, toolkit, .. } = self;
        for roles in outputs.iter_mut().filter_map(|o| o.roles_mut()) {
            roles.taskbar.add_handler(toolkit, handle, DEFAULT_TITLE, RAISED);
        }
        debug!("Managed window {} added", handle);
    }

    fn managed_surface_state_changed(&mut self, handle: u32, state: u32) {
        let Some(window) = self.windows.iter_mut().find(|w| w.handle == handle) else {
            debug!("State change for unknown window {}", handle);
            return;
        };
        window.state = state;
        for roles in self.outputs.iter_mut().filter_map(|o| o.roles_mut()) {
            roles.taskbar.set_handler_state(handle, state);
        }
    }

    fn managed_surface_title_changed(&mut self, handle: u32, title: &str) {
        let Some(window) = self.windows.iter_mut().find(|w| w.handle == handle) else {
            debug!("Title change for unknown window {}", handle);
            return;
        };
        window.title = title.to_string();

        let Self { outputs, toolkit, .. } = self;
        for roles in outputs.iter_mut().filter_map(|o| o.roles_mut()) {
            roles.taskbar.set_handler_title(toolkit, handle, title);
        }
    }

    fn managed_surface_removed(&mut self, handle: u32) {
        let Some(index) = self.windows.iter().position(|w| w.handle == handle) else {
            debug!("Removal of unknown window {}", handle);
            return;
        };
        self.windows.remove(index);

        let Self { outputs, toolkit, .. } = self;
        for roles in outputs.iter_mut().filter_map(|o| o.roles_mut()) {
            roles.taskbar.remove_handler(toolkit, handle);
        }
        self.ipc.send(ShellRequest::DestroyManagedSurface { handle });
        debug!("Managed window {} removed", handle);
    }

    // ========================================================================
    // Input
    // ========================================================================

    fn pointer(&mut self, surface: SurfaceId, event: PointerEvent) {
        match self.target(surface) {
            Some(Target::Panel(index)) => {
                if let Some(roles) = self.outputs[index].roles_mut() {
                    roles.panel.handle_pointer(&mut self.toolkit, &event);
                }
            }
            Some(Target::Taskbar(index)) => {
                if let Some(roles) = self.outputs[index].roles_mut() {
                    roles.taskbar.handle_pointer(&mut self.toolkit, &event);
                }
            }
            Some(Target::Unlock) => {
                let submitted = match &mut self.unlock_dialog {
                    Some(dialog) => dialog.handle_pointer(&mut self.toolkit, &event),
                    None => false,
                };
                if submitted {
                    self.defer(Task::FinishUnlock);
                }
            }
            Some(Target::Grab) => {
                if let Some(grab) = &self.grab {
                    grab.handle_pointer(&self.toolkit, &event, self.grab_cursor);
                }
            }
            Some(Target::Background) => {}
            None => debug!("Pointer event for unknown {}", surface),
        }
    }

    fn touch(&mut self, surface: SurfaceId, event: TouchEvent) {
        match self.target(surface) {
            Some(Target::Panel(index)) => {
                if let Some(roles) = self.outputs[index].roles_mut() {
                    roles.panel.handle_touch(&mut self.toolkit, &event);
                }
            }
            Some(Target::Unlock) => {
                let submitted = match &mut self.unlock_dialog {
                    Some(dialog) => dialog.handle_touch(&mut self.toolkit, &event),
                    None => false,
                };
                if submitted {
                    self.defer(Task::FinishUnlock);
                }
            }
            Some(_) => {}
            None => debug!("Touch event for unknown {}", surface),
        }
    }

    /// Tear everything down: grab surface, outputs, then the dialog
    pub fn shutdown(&mut self) {
        if let Some(grab) = self.grab.take() {
            grab.destroy(&mut self.toolkit);
        }
        for output in self.outputs.drain(..) {
            output.destroy(&mut self.toolkit);
        }
        if let Some(dialog) = self.unlock_dialog.take() {
            dialog.destroy(&mut self.toolkit);
        }
        info!("Desktop shut down");
    }
}

/// Resolve a surface to its role. Takes the fields so the caller keeps the
/// toolkit borrowable.
fn role_mut<'a>(
    outputs: &'a mut [Output],
    unlock_dialog: &'a mut Option<UnlockDialog>,
    grab: &'a mut Option<GrabSurface>,
    surface: SurfaceId,
) -> Option<&'a mut dyn SurfaceRole> {
    if let Some(dialog) = unlock_dialog.as_mut().filter(|d| d.surface() == surface) {
        return Some(dialog);
    }
    if let Some(grab) = grab.as_mut().filter(|g| g.surface() == surface) {
        return Some(grab);
    }
    outputs.iter_mut().find_map(|o| o.role_mut(surface))
}
