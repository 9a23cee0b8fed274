mod convergence;
mod rejection;
mod reconnect;
