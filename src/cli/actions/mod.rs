pub mod server;

pub enum Action {
    Server(server::Args),
}
