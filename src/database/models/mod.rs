pub mod movie;
pub mod permission;
pub mod token;
pub mod user;

pub use movie::{validate_movie, Movie, MovieStore, PgMovieStore, MOVIE_SORT_SAFELIST};
pub use permission::{PermissionStore, Permissions, PgPermissionStore, MOVIE_READ, MOVIE_WRITE};
pub use token::{validate_token_plaintext, PgTokenStore, Token, TokenScope, TokenStore};
pub use user::{
    validate_email, validate_password_plaintext, validate_user, PgUserStore, User, UserStore,
};
