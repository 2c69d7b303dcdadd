use crate::birth::BirthResolver;

pub struct AppState {
    pub births: BirthResolver,
}
