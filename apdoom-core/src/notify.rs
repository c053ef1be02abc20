//! Item-received icons that drop into the corner of the screen, bounce,
//! then slide out. Only the animation state lives here; the engine draws.

pub const NOTIF_SIZE: f32 = 30.0;
pub const NOTIF_PADDING: f32 = 2.0;

/// Lump names are at most eight characters.
const SPRITE_NAME_LEN: usize = 8;
const START_Y: f32 = -200.0 + NOTIF_SIZE / 2.0;
const RELEASE_Y: f32 = -160.0;
const GRAVITY: f32 = 0.15;
const MAX_FALL_SPEED: f32 = 8.0;
const BOUNCE: f32 = -0.3;
const HIDE_ACCEL: f32 = 0.14;
/// Ticks spent resting before sliding away (about ten seconds).
const REST_TICKS: i32 = 350;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NotifyState {
    Pending,
    Dropping,
    Hiding,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NotificationIcon {
    pub sprite: String,
    pub text: String,
    pub t: i32,
    pub x: i32,
    pub y: i32,
    pub xf: f32,
    pub yf: f32,
    pub velx: f32,
    pub vely: f32,
    pub state: NotifyState,
}

impl NotificationIcon {
    pub fn new(sprite: &str, text: Option<&str>) -> Self {
        let xf = NOTIF_SIZE / 2.0 + NOTIF_PADDING;
        let yf = START_Y;
        Self {
            sprite: sprite.chars().take(SPRITE_NAME_LEN).collect(),
            text: text.unwrap_or_default().to_string(),
            t: 0,
            x: xf as i32,
            y: yf as i32,
            xf,
            yf,
            velx: 0.0,
            vely: 0.0,
            state: NotifyState::Pending,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct NotificationQueue {
    icons: Vec<NotificationIcon>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, icon: NotificationIcon) {
        self.icons.push(icon);
    }

    pub fn icons(&self) -> &[NotificationIcon] {
        &self.icons
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// Advances every icon by one engine tick. Each icon stacks on top of
    /// the one before it; a pending icon waits until there is room.
    pub fn tick(&mut self) {
        let mut previous_y = 2.0_f32;
        self.icons.retain_mut(|icon| {
            if icon.state == NotifyState::Pending && previous_y > RELEASE_Y {
                icon.state = NotifyState::Dropping;
            }
            if icon.state == NotifyState::Pending {
                return true;
            }

            if icon.state == NotifyState::Dropping {
                icon.vely = (icon.vely + GRAVITY).min(MAX_FALL_SPEED);
                icon.yf += icon.vely;
                let floor = previous_y - NOTIF_SIZE - NOTIF_PADDING;
                if icon.yf >= floor {
                    icon.yf = floor;
                    icon.vely *= BOUNCE;
                    icon.t += 1;
                    if icon.t > REST_TICKS {
                        icon.state = NotifyState::Hiding;
                    }
                }
            }

            if icon.state == NotifyState::Hiding {
                icon.vely -= HIDE_ACCEL;
                icon.xf += icon.vely;
                if icon.xf < -NOTIF_SIZE / 2.0 {
                    return false;
                }
            }

            icon.x = icon.xf as i32;
            icon.y = icon.yf as i32;
            previous_y = icon.yf;
            true
        });
    }
}
