#[cfg(feature = "ssr")]
use lucky_tree::{establish_connection, reset_game};

#[cfg(feature = "ssr")]
fn main() {
    let game_id: i32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .expect("Usage: reset_game <game_id>");
    let mut conn = establish_connection();
    let removed = reset_game(&mut conn, game_id).expect("Failed to reset game");
    println!("Game {} has been reset, {} draws removed.", game_id, removed);
}

#[cfg(not(feature = "ssr"))]
fn main() {
    println!("This binary requires the 'ssr' feature to be enabled.");
}
