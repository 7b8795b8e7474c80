//! Outputs and their surface triads

use crate::config::{ShellConfig, ValidLauncher};
use crate::dispatch::TaskSender;
use crate::shell::background::Background;
use crate::shell::panel::Panel;
use crate::shell::taskbar::Taskbar;
use crate::shell::SurfaceRole;
use crate::toolkit::{SurfaceId, Toolkit};
use tessera_ipc::ShellRequest;
use tracing::{debug, info};

/// Panel, taskbar and background of one output. Created and destroyed
/// together.
pub struct OutputRoles {
    pub panel: Panel,
    pub taskbar: Taskbar,
    pub background: Background,
}

impl OutputRoles {
    pub fn is_painted(&self) -> bool {
        self.panel.painted() && self.taskbar.painted() && self.background.painted()
    }

    fn surfaces(&self) -> [SurfaceId; 3] {
        [
            self.panel.surface(),
            self.taskbar.surface(),
            self.background.surface(),
        ]
    }

    fn apply_transform(&self, toolkit: &mut Toolkit, transform: i32) {
        for surface in self.surfaces() {
            toolkit.set_buffer_transform(surface, transform);
        }
    }

    fn apply_scale(&self, toolkit: &mut Toolkit, scale: i32) {
        for surface in self.surfaces() {
            toolkit.set_buffer_scale(surface, scale);
        }
    }
}

/// One physical display, identified by its global name
pub struct Output {
    id: u32,
    roles: Option<OutputRoles>,
    /// Metadata seen before the roles existed
    transform: Option<i32>,
    scale: Option<i32>,
}

impl Output {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            roles: None,
            transform: None,
            scale: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn roles(&self) -> Option<&OutputRoles> {
        self.roles.as_ref()
    }

    pub fn roles_mut(&mut self) -> Option<&mut OutputRoles> {
        self.roles.as_mut()
    }

    pub fn is_initialized(&self) -> bool {
        self.roles.is_some()
    }

    /// Create the triad and hand each surface its role
    pub fn init(
        &mut self,
        toolkit: &mut Toolkit,
        config: &ShellConfig,
        launchers: &[ValidLauncher],
        tasks: &TaskSender,
    ) {
        if self.roles.is_some() {
            return;
        }

        let panel = Panel::create(toolkit, config, launchers, tasks);
        toolkit.ipc().send(ShellRequest::SetPanel {
            output: self.id,
            surface: panel.surface().0,
        });

        let taskbar = Taskbar::create(toolkit, config);
        toolkit.ipc().send(ShellRequest::SetTaskbar {
            output: self.id,
            surface: taskbar.surface().0,
        });

        let background = Background::create(toolkit, config);
        toolkit.ipc().send(ShellRequest::SetBackground {
            output: self.id,
            surface: background.surface().0,
        });

        let roles = OutputRoles {
            panel,
            taskbar,
            background,
        };
        if let Some(transform) = self.transform {
            roles.apply_transform(toolkit, transform);
        }
        if let Some(scale) = self.scale {
            roles.apply_scale(toolkit, scale);
        }

        info!("Output {} initialized", self.id);
        self.roles = Some(roles);
    }

    pub fn set_transform(&mut self, toolkit: &mut Toolkit, transform: i32) {
        self.transform = Some(transform);
        if let Some(roles) = &self.roles {
            roles.apply_transform(toolkit, transform);
        }
    }

    pub fn set_scale(&mut self, toolkit: &mut Toolkit, scale: i32) {
        self.scale = Some(scale);
        if let Some(roles) = &self.roles {
            roles.apply_scale(toolkit, scale);
        }
    }

    /// An output without its triad is not painted
    pub fn is_painted(&self) -> bool {
        self.roles.as_ref().is_some_and(OutputRoles::is_painted)
    }

    pub fn owns(&self, surface: SurfaceId) -> bool {
        self.roles
            .as_ref()
            .is_some_and(|roles| roles.surfaces().contains(&surface))
    }

    pub fn role_mut(&mut self, surface: SurfaceId) -> Option<&mut dyn SurfaceRole> {
        let roles = self.roles.as_mut()?;
        if roles.panel.surface() == surface {
            Some(&mut roles.panel)
        } else if roles.taskbar.surface() == surface {
            Some(&mut roles.taskbar)
        } else if roles.background.surface() == surface {
            Some(&mut roles.background)
        } else {
            None
        }
    }

    /// Background, then panel, then taskbar, then the output itself
    pub fn destroy(self, toolkit: &mut Toolkit) {
        if let Some(roles) = self.roles {
            roles.background.destroy(toolkit);
            roles.panel.destroy(toolkit);
            roles.taskbar.destroy(toolkit);
        }
        toolkit.ipc().send(ShellRequest::ReleaseOutput { output: self.id });
        debug!("Output {} destroyed", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dispatch, ipc};

    #[test]
    fn test_metadata_before_init_is_applied() {
        let (ipc, _rx) = ipc::channel();
        let (tasks, _task_rx) = dispatch::task_channel();
        let mut toolkit = Toolkit::new(ipc);
        let mut output = Output::new(7);

        output.set_transform(&mut toolkit, 1);
        output.set_scale(&mut toolkit, 2);
        assert!(!output.is_painted());

        output.init(&mut toolkit, &ShellConfig::default(), &[ValidLauncher::default_terminal()], &tasks);
        let roles = output.roles().unwrap();
        for surface in roles.surfaces() {
            assert_eq!(toolkit.buffer_transform(surface), Some(1));
            assert_eq!(toolkit.buffer_scale(surface), Some(2));
        }
    }

    #[test]
    fn test_init_assigns_roles_in_order() {
        let (ipc, mut rx) = ipc::channel();
        let (tasks, _task_rx) = dispatch::task_channel();
        let mut toolkit = Toolkit::new(ipc);
        let mut output = Output::new(3);
        output.init(&mut toolkit, &ShellConfig::default(), &[ValidLauncher::default_terminal()], &tasks);

        let roles: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|r| {
                matches!(
                    r,
                    ShellRequest::SetPanel { .. }
                        | ShellRequest::SetTaskbar { .. }
                        | ShellRequest::SetBackground { .. }
                )
            })
            .collect();
        let triad = output.roles().unwrap().surfaces();
        assert_eq!(
            roles,
            vec![
                ShellRequest::SetPanel { output: 3, surface: triad[0].0 },
                ShellRequest::SetTaskbar { output: 3, surface: triad[1].0 },
                ShellRequest::SetBackground { output: 3, surface: triad[2].0 },
            ]
        );
    }

    #[test]
    fn test_destroy_order() {
        let (ipc, mut rx) = ipc::channel();
        let (tasks, _task_rx) = dispatch::task_channel();
        let mut toolkit = Toolkit::new(ipc);
        let mut output = Output::new(4);
        output.init(&mut toolkit, &ShellConfig::default(), &[ValidLauncher::default_terminal()], &tasks);
        let [panel, taskbar, background] = output.roles().unwrap().surfaces();
        while rx.try_recv().is_ok() {}

        output.destroy(&mut toolkit);
        let requests: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            requests,
            vec![
                ShellRequest::DestroySurface { surface: background.0 },
                ShellRequest::DestroySurface { surface: panel.0 },
                ShellRequest::DestroySurface { surface: taskbar.0 },
                ShellRequest::ReleaseOutput { output: 4 },
            ]
        );
    }
}
