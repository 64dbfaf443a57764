mod booking;
mod review;
mod role;
mod state;
mod tour;
mod user;

pub use booking::BOOKINGS;
pub use review::REVIEWS;
pub use role::Role;
pub use state::AppState;
pub use tour::{
    Difficulty, GuideSummary, Location, MonthlyPlan, ReviewSummary, START_LAT_EXPR,
    START_LNG_EXPR, TOUR_CARD_COLUMNS, TOURS, TourCard, TourDistance, TourPage, TourStats,
};
pub use user::{USERS, User};
