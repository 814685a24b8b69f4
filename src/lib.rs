pub mod app;
pub mod assistant;
pub mod auth;
pub mod cards;
pub mod cleanup;
pub mod config;
pub mod models;
pub mod repos;
pub mod spotify;
pub mod web;
