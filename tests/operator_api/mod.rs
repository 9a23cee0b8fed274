mod health;
mod publish;
