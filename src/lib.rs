//! # SuriKiosk — Noyau de sécurité d'un terminal d'examen
//!
//! Verrouille une session de navigation : filtrage des URL, filtrage des
//! raccourcis clavier, fenêtre plein écran toujours au premier plan, et une
//! seule porte de sortie contrôlée.
//!
//! ## Architecture des modules
//!
//! - [`rules`] : `RuleSet` (listes de domaines, motifs d'URL, drapeaux) et
//!   `RuleStore`, qui publie un nouveau jeu de règles d'un seul coup.
//!
//! - [`url_access`] : décision allow/block pour une navigation ou une
//!   ressource, et détection des URL de sortie.
//!
//! - [`keyboard`] : classification des combinaisons de touches en cinq
//!   catégories et décision pass/block.
//!
//! - [`window`] : machine à états qui corrige la dérive de la fenêtre
//!   (plein écran, focus, premier plan) derrière le trait `WindowControl`.
//!
//! - [`coordinator`] : `SecurityCoordinator`, seul point d'entrée des hooks
//!   de l'hôte (`HostHooks`) ; compte les violations et émet les événements.
//!
//! - [`events`] : `SecurityEvent`, `EventSink`, compteurs de violations.
//!
//! - [`exit`] : invite de mot de passe derrière la touche de sortie.
//!
//! - [`kiosk`] : shell Winit — fenêtre, `ProxySink`, `ApplicationHandler`.
//!
//! - [`keyutils`] : conversion des événements clavier Winit.
//!
//! - [`config`] / [`logging`] / [`error`] : configuration TOML, tracing,
//!   types d'erreur.
//!
//! Le moteur web reste externe : ses delegates de navigation et de
//! chargement de ressources appellent [`coordinator::HostHooks`].

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod exit;
pub mod keyboard;
pub mod keyutils;
pub mod kiosk;
pub mod logging;
pub mod rules;
pub mod url_access;
pub mod window;
